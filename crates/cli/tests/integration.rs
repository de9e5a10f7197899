//! Integration tests for the bt CLI
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! # Start an S3-compatible server
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! # Run tests
//! TEST_S3_ENDPOINT=http://localhost:9000 \
//! TEST_S3_ACCESS_KEY=accesskey \
//! TEST_S3_SECRET_KEY=secretkey \
//!     cargo test -p bulk-transfer --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use aws_sdk_s3::primitives::ByteStream;
use bt_core::EndpointConfig;
use bt_s3::S3Client;
use tempfile::TempDir;

/// Get the path to the bt binary
fn bt_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_bt") {
        return PathBuf::from(path);
    }

    let target = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target");

    let debug = target.join("debug/bt");
    if debug.exists() {
        return debug;
    }
    target.join("release/bt")
}

/// Get S3 test configuration from environment
fn endpoint_from_env() -> Option<EndpointConfig> {
    Some(EndpointConfig {
        url: Some(std::env::var("TEST_S3_ENDPOINT").ok()?),
        region: Some("us-east-1".into()),
        force_path_style: true,
        access_key: Some(std::env::var("TEST_S3_ACCESS_KEY").ok()?),
        secret_key: Some(std::env::var("TEST_S3_SECRET_KEY").ok()?),
        ..Default::default()
    })
}

/// Isolated config directory pointing bt at the test server
struct TestEnv {
    config_dir: TempDir,
    client: S3Client,
    runtime: tokio::runtime::Runtime,
}

impl TestEnv {
    fn new() -> Option<Self> {
        let endpoint = endpoint_from_env()?;
        let config_dir = tempfile::tempdir().ok()?;

        let config = format!(
            "schema_version = 1\n\n[defaults]\nmax_workers = 4\nprogress = false\n\n\
             [endpoint]\nurl = \"{}\"\nregion = \"us-east-1\"\nforce_path_style = true\n\
             access_key = \"{}\"\nsecret_key = \"{}\"\n",
            endpoint.url.as_deref()?,
            endpoint.access_key.as_deref()?,
            endpoint.secret_key.as_deref()?,
        );
        std::fs::write(config_dir.path().join("config.toml"), config).ok()?;

        let runtime = tokio::runtime::Runtime::new().ok()?;
        let client = runtime.block_on(S3Client::new(&endpoint)).ok()?;

        Some(Self {
            config_dir,
            client,
            runtime,
        })
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(bt_binary())
            .args(args)
            .env("BT_CONFIG_DIR", self.config_dir.path())
            .env_remove("BT_MAX_WORKERS")
            .output()
            .expect("Failed to execute bt command")
    }

    fn create_bucket(&self, name: &str) -> String {
        let bucket = format!("bt-{name}-{}", unique_suffix());
        self.runtime
            .block_on(self.client.inner().create_bucket().bucket(&bucket).send())
            .expect("create bucket");
        bucket
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        self.runtime
            .block_on(
                self.client
                    .inner()
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(body.to_vec()))
                    .send(),
            )
            .expect("put object");
    }

    fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.runtime.block_on(async {
            let response = self
                .client
                .inner()
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .ok()?;
            Some(response.body.collect().await.ok()?.into_bytes().to_vec())
        })
    }
}

/// Generate unique suffix for test resources
fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

macro_rules! require_env {
    () => {
        match TestEnv::new() {
            Some(env) => env,
            None => {
                eprintln!("Skipping: TEST_S3_* environment not set or server unreachable");
                return;
            }
        }
    };
}

mod download {
    use super::*;

    #[test]
    fn test_download_preserves_structure() {
        let env = require_env!();
        let bucket = env.create_bucket("download");
        env.put(&bucket, "data/a.txt", b"alpha");
        env.put(&bucket, "data/sub/b.txt", b"bravo");
        env.put(&bucket, "other/c.txt", b"charlie");
        let out = TempDir::new().unwrap();
        let dest = out.path().join("dest");

        let output = env.run(&[
            "download",
            &format!("s3://{bucket}/data/"),
            dest.to_str().unwrap(),
        ]);
        let text = stdout(&output);

        assert_eq!(output.status.code(), Some(0), "stdout: {text}");
        assert_eq!(read(&dest.join("a.txt")), b"alpha");
        assert_eq!(read(&dest.join("sub").join("b.txt")), b"bravo");
        assert!(!dest.join("c.txt").exists());

        assert!(text.contains(&format!("Downloading from s3://{bucket}/data/ to ")));
        assert!(text.contains("Downloaded: data/a.txt to "));
        assert!(text.contains("Downloaded: data/sub/b.txt to "));
        assert!(text.ends_with(
            "--- Summary ---\nTotal Files: 2\nSucceeded: 2\nErrors: 0\nSuccess Rate: 100.00%\n"
        ));
    }

    #[test]
    fn test_download_without_scheme_or_trailing_slash() {
        let env = require_env!();
        let bucket = env.create_bucket("noscheme");
        env.put(&bucket, "data/a.txt", b"alpha");
        env.put(&bucket, "database/x.txt", b"not me");
        let out = TempDir::new().unwrap();

        let output = env.run(&[
            "download",
            &format!("{bucket}/data"),
            out.path().to_str().unwrap(),
            "--quiet",
        ]);

        assert_eq!(output.status.code(), Some(0));
        assert!(out.path().join("a.txt").exists());
        assert!(!out.path().join("x.txt").exists());
        assert!(!stdout(&output).contains("Downloaded:"));
    }

    #[test]
    fn test_rerun_overwrites() {
        let env = require_env!();
        let bucket = env.create_bucket("rerun");
        env.put(&bucket, "data/a.txt", b"first");
        let out = TempDir::new().unwrap();
        let source = format!("s3://{bucket}/data/");
        let dest = out.path().to_str().unwrap();

        assert_eq!(env.run(&["download", &source, dest]).status.code(), Some(0));
        env.put(&bucket, "data/a.txt", b"second");
        assert_eq!(env.run(&["download", &source, dest]).status.code(), Some(0));

        assert_eq!(read(&out.path().join("a.txt")), b"second");
    }

    #[test]
    fn test_empty_prefix_is_not_found() {
        let env = require_env!();
        let bucket = env.create_bucket("empty");
        let out = TempDir::new().unwrap();

        let output = env.run(&[
            "download",
            &format!("s3://{bucket}/nothing/"),
            out.path().to_str().unwrap(),
        ]);

        assert_eq!(output.status.code(), Some(5));
        assert!(!stdout(&output).contains("--- Summary ---"));
    }

    #[test]
    fn test_destination_file_is_usage_error() {
        let env = require_env!();
        let out = TempDir::new().unwrap();
        let file = out.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let output = env.run(&["download", "s3://any-bucket/data/", file.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_json_output() {
        let env = require_env!();
        let bucket = env.create_bucket("json");
        env.put(&bucket, "data/a.txt", b"alpha");
        let out = TempDir::new().unwrap();

        let output = env.run(&[
            "download",
            &format!("s3://{bucket}/data/"),
            out.path().to_str().unwrap(),
            "--json",
        ]);
        assert_eq!(output.status.code(), Some(0));

        let lines: Vec<serde_json::Value> = stdout(&output)
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is JSON"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "success");
        assert_eq!(lines[0]["source"]["key"], "data/a.txt");
        assert_eq!(lines[1]["summary"]["total"], 1);
        assert_eq!(lines[1]["bytes"], 5);
    }
}

mod copy {
    use super::*;

    #[test]
    fn test_copy_between_buckets() {
        let env = require_env!();
        let src = env.create_bucket("copysrc");
        let dst = env.create_bucket("copydst");
        env.put(&src, "data/a.txt", b"alpha");
        env.put(&src, "data/sub/b.txt", b"bravo");
        env.put(&src, "data/with space+plus.txt", b"odd");

        let output = env.run(&[
            "copy",
            &format!("s3://{src}/data/"),
            &format!("s3://{dst}/backup/"),
            "--max-workers",
            "2",
        ]);
        let text = stdout(&output);

        assert_eq!(output.status.code(), Some(0), "stdout: {text}");
        assert!(text.contains(&format!("Copied: data/a.txt to s3://{dst}/backup/a.txt")));
        assert_eq!(env.get(&dst, "backup/a.txt").unwrap(), b"alpha");
        assert_eq!(env.get(&dst, "backup/sub/b.txt").unwrap(), b"bravo");
        assert_eq!(env.get(&dst, "backup/with space+plus.txt").unwrap(), b"odd");
    }

    #[test]
    fn test_dry_run_copies_nothing() {
        let env = require_env!();
        let src = env.create_bucket("drysrc");
        let dst = env.create_bucket("drydst");
        env.put(&src, "data/a.txt", b"alpha");

        let output = env.run(&[
            "copy",
            &format!("s3://{src}/data/"),
            &format!("s3://{dst}/"),
            "--dry-run",
        ]);

        assert_eq!(output.status.code(), Some(0));
        assert!(stdout(&output).contains(&format!("Would copy: data/a.txt to s3://{dst}/a.txt")));
        assert!(env.get(&dst, "a.txt").is_none());
    }

    #[test]
    fn test_missing_source_bucket_is_not_found() {
        let env = require_env!();
        let dst = env.create_bucket("nosrc");

        let output = env.run(&[
            "copy",
            &format!("s3://missing-{}/data/", unique_suffix()),
            &format!("s3://{dst}/"),
        ]);

        assert_eq!(output.status.code(), Some(5));
    }
}
