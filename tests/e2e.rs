use anyhow::Result;
use std::path::PathBuf;

use ferry::{Client, FerryError};

/// Start a real server on an ephemeral port. The root is a `root/` directory
/// inside a fresh tempdir so traversal tests have a sibling area that must
/// stay untouched.
async fn start_server() -> Result<(u16, tempfile::TempDir, PathBuf)> {
    let outer = tempfile::tempdir()?;
    let root = outer.path().join("root");
    std::fs::create_dir(&root)?;

    let port = {
        let sock = std::net::TcpListener::bind("127.0.0.1:0")?;
        let p = sock.local_addr()?.port();
        drop(sock);
        p
    };
    let bind = format!("127.0.0.1:{}", port);
    let serve_root = root.clone();
    tokio::spawn(async move {
        let _ = ferry::server::serve(&bind, &serve_root).await;
    });

    // Wait for the server to start accepting connections
    for _ in 0..50u32 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    Ok((port, outer, root))
}

async fn connect(port: u16) -> Result<Client> {
    Ok(Client::connect(&format!("127.0.0.1:{}", port)).await?)
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mkdir_then_list_shows_directory() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut client = connect(port).await?;

    client.mkdir("alpha/beta").await?;

    let top = client.list("").await?;
    assert!(top.iter().any(|e| e.name == "alpha" && e.is_dir));

    let inner = client.list("alpha").await?;
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].name, "beta");
    assert_eq!(inner[0].path, "alpha/beta");
    assert!(inner[0].is_dir);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn put_get_round_trip_byte_exact() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut client = connect(port).await?;

    // Zero-length, small, and multi-chunk payloads over one session
    for (name, len) in [("empty.bin", 0usize), ("small.bin", 8 * 1024), ("big.bin", 1_100_000)] {
        let data = patterned(len);
        client.put(name, &data).await?;
        let back = client.get(name).await?;
        assert_eq!(back.len(), len);
        assert_eq!(back, data);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn traversal_requests_are_rejected() -> Result<()> {
    let (port, outer, _root) = start_server().await?;
    std::fs::write(outer.path().join("secret.txt"), "top secret")?;
    let mut client = connect(port).await?;

    let err = client.get("../secret.txt").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));

    let err = client.put("../evil.txt", b"payload").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));
    assert!(!outer.path().join("evil.txt").exists());

    let err = client.mkdir("../outside").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));
    assert!(!outer.path().join("outside").exists());

    let err = client.list("..").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));

    // Rejections are recoverable: the same session keeps working
    client.mkdir("still-alive").await?;
    assert!(client.list("").await?.iter().any(|e| e.name == "still-alive"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn symlinked_intermediate_cannot_escape_root() -> Result<()> {
    let (port, outer, root) = start_server().await?;
    let landing = outer.path().join("landing");
    std::fs::create_dir(&landing)?;
    std::os::unix::fs::symlink(&landing, root.join("link"))?;
    let mut client = connect(port).await?;

    // The target and its parent do not exist yet; only the symlink does
    let err = client.put("link/new/file.txt", b"payload").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));
    assert!(!landing.join("new").exists());

    let err = client.mkdir("link/new/dir").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));
    assert!(!landing.join("new").exists());

    let err = client.get("link/anything.txt").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));

    // The session survives the rejections
    client.put("inside.txt", b"ok").await?;
    assert!(root.join("inside.txt").is_file());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listing_orders_directories_before_files() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut client = connect(port).await?;

    client.put("banana.txt", b"b").await?;
    client.put("aardvark.txt", b"a").await?;
    client.mkdir("zoo").await?;
    client.mkdir("apple").await?;

    let entries = client.list("").await?;
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["apple", "zoo", "aardvark.txt", "banana.txt"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_on_missing_or_directory_path_is_structured_error() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut client = connect(port).await?;

    let err = client.get("nope.txt").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));

    client.mkdir("a-directory").await?;
    let err = client.get("a-directory").await.unwrap_err();
    assert!(matches!(err, FerryError::Path(_)));

    // No byte stream was started either time; a normal transfer still works
    client.put("real.txt", b"content").await?;
    assert_eq!(client.get("real.txt").await?, b"content");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mkdir_is_idempotent() -> Result<()> {
    let (port, _outer, root) = start_server().await?;
    let mut client = connect(port).await?;

    client.mkdir("docs/drafts").await?;
    client.mkdir("docs/drafts").await?;
    assert!(root.join("docs/drafts").is_dir());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn put_overwrites_existing_file() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut client = connect(port).await?;

    client.put("note.txt", b"first version, longer").await?;
    client.put("note.txt", b"second").await?;
    assert_eq!(client.get("note.txt").await?, b"second");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_download_scenario() -> Result<()> {
    let (port, _outer, root) = start_server().await?;
    let mut client = connect(port).await?;

    // mkdir docs -> put docs/a.txt (5 bytes) -> get it back
    client.mkdir("docs").await?;
    client.put("docs/a.txt", b"hello").await?;
    let back = client.get("docs/a.txt").await?;
    assert_eq!(back, b"hello");

    // The bytes really landed under the server root
    assert_eq!(std::fs::read(root.join("docs/a.txt"))?, b"hello");

    let entries = client.list("docs").await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "a.txt");
    assert_eq!(entries[0].path, "docs/a.txt");
    assert!(!entries[0].is_dir);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn put_creates_missing_parent_directories() -> Result<()> {
    let (port, _outer, root) = start_server().await?;
    let mut client = connect(port).await?;

    client.put("deep/nested/tree/file.bin", &patterned(2048)).await?;
    assert!(root.join("deep/nested/tree/file.bin").is_file());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sessions_are_independent() -> Result<()> {
    let (port, _outer, _root) = start_server().await?;
    let mut first = connect(port).await?;
    let mut second = connect(port).await?;

    first.mkdir("from-first").await?;
    second.mkdir("from-second").await?;
    first.put("from-first/a.bin", &patterned(4096)).await?;
    second.put("from-second/b.bin", &patterned(4096)).await?;

    // Each session sees the shared tree; neither disturbed the other
    for client in [&mut first, &mut second] {
        let names: Vec<String> = client.list("").await?.into_iter().map(|e| e.name).collect();
        assert!(names.contains(&"from-first".to_string()));
        assert!(names.contains(&"from-second".to_string()));
    }
    assert_eq!(first.get("from-second/b.bin").await?, patterned(4096));
    Ok(())
}
