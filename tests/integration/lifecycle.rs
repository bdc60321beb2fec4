use crate::*;

use hosttrack_core::config::HostTrackConfig;
use hosttrack_core::{AddressKey, ServiceEntry};
use hosttrack_services::ProtocolReferences;

const HK: [u8; 16] = [
    0xde, 0xad, 0xbe, 0xef, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef,
];

/// A tracker inserted with a service comes back intact, looked up by raw bytes.
#[test]
fn test_insert_then_find_by_raw_bytes() -> Result<()> {
    let cache = new_cache(16)?;
    let ip = IpAddr::from(HK);
    let tracker = HostTracker::new(ip);
    tracker.add_service(ServiceEntry::new(6, 443, 2));
    cache.add_host_tracker(tracker);

    let found = cache.find(&HK[..]).context("host missing")?;
    assert_eq!(found.ip_addr(), ip);
    assert_eq!(found.key(), HK);
    assert_eq!(found.find_service(6, 443), Some(ServiceEntry::new(6, 443, 2)));
    Ok(())
}

/// The compound hot-path call: unknown host, new service, duplicate, second service.
#[test]
fn test_add_service_lifecycle() -> Result<()> {
    let cache = new_cache(16)?;
    let ip = v6_host(7);

    assert!(!cache.add_service(ip, 17, 443, "udp"), "unknown host must be rejected");
    assert!(cache.is_empty());

    seed_host(&cache, ip);
    assert!(cache.add_service(ip, 17, 443, "udp"));
    assert!(!cache.add_service(ip, 17, 443, "tcp"));
    assert!(cache.add_service(ip, 6, 22, "tcp"));

    let host = cache.find(ip).context("host missing")?;
    assert_eq!(host.find_service(17, 443), Some(ServiceEntry::new(17, 443, 1)));
    assert_eq!(host.find_service(6, 22), Some(ServiceEntry::new(6, 22, 2)));
    assert_eq!(host.service_count(), 2);
    Ok(())
}

/// N+1 distinct hosts into a cache of N leaves N, minus the oldest.
#[test]
fn test_capacity_bound_holds() -> Result<()> {
    const N: u32 = 64;
    let cache = new_cache(N as usize)?;
    for n in 0..=N {
        seed_host(&cache, v4_host(n));
    }

    assert_eq!(cache.len(), N as usize);
    assert!(!cache.contains(v4_host(0)));
    for n in 1..=N {
        assert!(cache.contains(v4_host(n)), "host {n} missing");
    }
    assert_eq!(cache.stats().evictions, 1);
    Ok(())
}

/// Hot hosts survive a sweep of cold ones.
#[test]
fn test_recently_used_hosts_survive() -> Result<()> {
    let cache = new_cache(8)?;
    let hot = v4_host(1);
    seed_host(&cache, hot);

    for n in 100..200 {
        seed_host(&cache, v4_host(n));
        cache.find(hot).context("hot host evicted")?;
    }
    assert!(cache.contains(hot));
    assert_eq!(cache.len(), 8);
    Ok(())
}

/// After clear nothing is found, but handles taken earlier still work.
#[test]
fn test_clear_releases_only_cache_handles() -> Result<()> {
    let cache = new_cache(16)?;
    let ips: Vec<IpAddr> = (0..10).map(v4_host).collect();
    for ip in &ips {
        seed_host(&cache, *ip);
        cache.add_service(*ip, 6, 80, "tcp");
    }
    let held = cache.find(ips[3]).context("host missing")?;

    cache.clear();
    for ip in &ips {
        assert!(cache.find(*ip).is_none());
    }
    assert_eq!(held.ip_addr(), ips[3]);
    assert_eq!(held.find_service(6, 80), Some(ServiceEntry::new(6, 80, 2)));
    assert_eq!(Arc::strong_count(&held), 1);
    Ok(())
}

/// Config file → registry → cache, the way the pipeline wires it at startup.
#[test]
fn test_cache_built_from_config() -> Result<()> {
    let config: HostTrackConfig = load_config_text(
        "[cache]\ncapacity = 2\n\n[protocols]\nmax_references = 8\n",
    )?;
    let registry = Arc::new(ProtocolReferences::from_config(&config.protocols));
    let cache = HostCache::from_config(&config.cache, registry.clone())?;
    assert_eq!(cache.capacity().get(), 2);

    let ip = v4_host(42);
    seed_host(&cache, ip);
    assert!(cache.add_service(ip, 6, 443, "ssl"));
    assert!(cache.add_service(ip, 6, 80, "http"));

    let ssl = registry.find("ssl").context("ssl not registered")?;
    let host = cache.find(ip).context("host missing")?;
    assert_eq!(host.find_service(6, 443).map(|s| s.app_id()), Some(ssl));
    assert_ne!(registry.find("http"), Some(ssl));
    Ok(())
}

/// Status dumps serialize to the shape operators read.
#[test]
fn test_snapshot_and_stats_serialize() -> Result<()> {
    let cache = new_cache(4)?;
    let ip = v4_host(9);
    seed_host(&cache, ip);
    cache.add_service(ip, 17, 53, "dns");

    let dump = serde_json::to_value(cache.snapshot())?;
    assert_eq!(dump[0]["ip_addr"], "10.0.0.9");
    assert_eq!(dump[0]["services"][0]["port"], 53);

    let stats = serde_json::to_value(cache.stats())?;
    assert_eq!(stats["inserts"], 1);
    assert_eq!(stats["hits"], 1);
    Ok(())
}

/// IPv4 hosts are reachable through every address form.
#[test]
fn test_ipv4_forms_share_one_entry() -> Result<()> {
    let cache = new_cache(4)?;
    seed_host(&cache, IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1)));
    seed_host(&cache, IpAddr::V6(Ipv4Addr::new(172, 16, 0, 1).to_ipv6_mapped()));

    assert_eq!(cache.len(), 1);
    assert!(cache.find(&[172u8, 16, 0, 1][..]).is_some());
    assert!(cache.find(AddressKey::from(Ipv4Addr::new(172, 16, 0, 1))).is_some());
    Ok(())
}

fn load_config_text(text: &str) -> Result<HostTrackConfig> {
    let dir = std::env::temp_dir().join(format!("hosttrack-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("config.toml");
    std::fs::write(&path, text)?;
    let config = HostTrackConfig::load_from(&path)?;
    config.validate()?;
    let _ = std::fs::remove_dir_all(&dir);
    Ok(config)
}
