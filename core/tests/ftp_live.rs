//! FTP adapter tests against the `ftp` container.
//!
//! Requires: `docker compose -f tests/docker/docker-compose.yml up -d`
//! Skips gracefully if the container is not running.

mod common;

use common::{live_config, require_server, PORT_FTP};
use filebridge_core::config::ProtocolKind;
use filebridge_core::connection::ConnectionRegistry;
use filebridge_core::errors::{CoreError, FileError};

#[tokio::test]
async fn ftp_wrong_password_is_connection_error() {
    require_server!(PORT_FTP);
    let registry = ConnectionRegistry::with_network();
    let config = live_config(ProtocolKind::Ftp, PORT_FTP).with_password("wrong");
    assert!(matches!(
        registry.connect(config).await,
        Err(CoreError::Connection(_))
    ));
}

#[tokio::test]
async fn ftp_put_list_get_remove() {
    require_server!(PORT_FTP);
    let registry = ConnectionRegistry::with_network();
    let session = registry
        .connect(live_config(ProtocolKind::Ftp, PORT_FTP))
        .await
        .unwrap();
    let adapter = session.adapter();

    let home = adapter.list(".").await.unwrap().path;
    let dir = format!("{}/ftp-live", home.trim_end_matches('/'));
    adapter.make_directory(&format!("{dir}/nested")).await.unwrap();

    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("hello.txt");
    std::fs::write(&src, "hello over ftp").unwrap();
    let sent = adapter
        .put_file(&src, &format!("{dir}/hello.txt"))
        .await
        .unwrap();
    assert_eq!(sent, 14);

    let listing = adapter.list(&dir).await.unwrap();
    let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["nested", "hello.txt"]);

    let entry = adapter.stat(&format!("{dir}/hello.txt")).await.unwrap();
    assert!(!entry.is_directory);
    assert_eq!(entry.size, 14);

    let dst = local.path().join("back.txt");
    adapter
        .get_file(&format!("{dir}/hello.txt"), &dst)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello over ftp");

    let err = adapter
        .change_permissions(&format!("{dir}/hello.txt"), 0o600)
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::NotSupported(_)));

    adapter.remove(&dir, true).await.unwrap();
    registry.disconnect(&session.id).await.unwrap();
}

#[tokio::test]
async fn ftp_concurrent_lists_keep_their_directory() {
    require_server!(PORT_FTP);
    let registry = ConnectionRegistry::with_network();
    let session = registry
        .connect(live_config(ProtocolKind::Ftp, PORT_FTP))
        .await
        .unwrap();

    let home = session.adapter().list(".").await.unwrap().path;
    let base = format!("{}/ftp-concurrent", home.trim_end_matches('/'));
    let left = format!("{base}/left");
    let right = format!("{base}/right");

    let local = tempfile::tempdir().unwrap();
    let src = local.path().join("seed.txt");
    std::fs::write(&src, "x").unwrap();
    for (dir, prefix) in [(&left, "l"), (&right, "r")] {
        session.adapter().make_directory(dir).await.unwrap();
        for i in 0..3 {
            session
                .adapter()
                .put_file(&src, &format!("{dir}/{prefix}{i}.txt"))
                .await
                .unwrap();
        }
    }

    let mut tasks = Vec::new();
    for round in 0..12 {
        let session = session.clone();
        let (path, prefix) = if round % 2 == 0 {
            (left.clone(), 'l')
        } else {
            (right.clone(), 'r')
        };
        tasks.push(tokio::spawn(async move {
            let listing = session.adapter().list(&path).await.unwrap();
            (path, prefix, listing)
        }));
    }
    for task in tasks {
        let (path, prefix, listing) = task.await.unwrap();
        assert_eq!(listing.path, path);
        assert_eq!(listing.entries.len(), 3);
        assert!(listing.entries.iter().all(|e| e.name.starts_with(prefix)));
    }

    session.adapter().remove(&base, true).await.unwrap();
    registry.disconnect(&session.id).await.unwrap();
}
