//! Minimal store walkthrough: upsert band rows for two content hashes,
//! look one band up, and stream the collision buckets.

use index::{BackendConfig, RepoFile, Store};
use sketch::Mode;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::new(BackendConfig::in_memory())?;

    // Two files colliding on hashtable 0, diverging on hashtable 1.
    let shared = vec![0xAB; 32];
    store.upsert_bands(Mode::File, "sha-left", &[shared.clone(), vec![0x01; 32]])?;
    store.upsert_bands(Mode::File, "sha-right", &[shared.clone(), vec![0x02; 32]])?;

    store.insert_meta(&RepoFile {
        repo: "github.com/acme/left".into(),
        commit: "11aa22b".into(),
        path: "src/parse.go".into(),
        sha: "sha-left".into(),
    })?;

    let mut hits = Vec::new();
    store.lookup(Mode::File, 0, &shared, &mut |sha| {
        hits.push(sha.to_string());
        Ok(())
    })?;
    println!("hashtable 0 collisions: {hits:?}");

    store.scan_buckets(Mode::File, &mut |ht, _, members| {
        println!("bucket in hashtable {ht}: {members:?}");
        Ok(())
    })?;

    for file in store.find_by_content_hash("sha-left")? {
        println!("sha-left found at {}/{}", file.repo, file.path);
    }

    Ok(())
}
