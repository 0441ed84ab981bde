//! Disposable Postgres databases for integration suites.
//!
//! `TESSERA_TEST_DATABASE_URL` points the helpers at an existing server; each
//! call then creates and later drops its own database on that server. Without
//! it, a throwaway cluster is initialised from the local `initdb` and
//! `postgres` binaries. Suites treat an `Err` from [`start_postgres`] as a
//! reason to skip.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use postgres::NoTls;
use url::Url;

const DATABASE_URL_ENV: &str = "TESSERA_TEST_DATABASE_URL";
const READY_ATTEMPTS: usize = 30;
const READY_INTERVAL: Duration = Duration::from_millis(200);

/// A database created for one test; dropped (with any spawned server) on drop.
pub struct TestDatabase {
    url: String,
    scratch: Option<ScratchDatabase>,
    server: Option<LocalServer>,
}

impl TestDatabase {
    /// Connection URL for `sqlx` or any other Postgres client.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.url
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            let statement = format!("DROP DATABASE IF EXISTS \"{}\"", scratch.name);
            let _ = run_admin(&scratch.admin_url, statement);
        }
        if let Some(server) = self.server.take() {
            server.shutdown();
        }
    }
}

struct ScratchDatabase {
    admin_url: String,
    name: String,
}

struct LocalServer {
    process: Child,
    data_dir: PathBuf,
}

impl LocalServer {
    fn shutdown(mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
        let _ = fs::remove_dir_all(&self.data_dir);
    }
}

/// Provision a fresh, empty database.
///
/// # Errors
///
/// Returns an error when no external server is configured and local Postgres
/// binaries are missing or fail to start, or when the scratch database cannot
/// be created.
pub fn start_postgres() -> Result<TestDatabase> {
    if let Ok(base) = std::env::var(DATABASE_URL_ENV) {
        let (url, scratch) = create_scratch_database(&base)?;
        return Ok(TestDatabase {
            url,
            scratch: Some(scratch),
            server: None,
        });
    }

    let (server, port) = spawn_local_server()?;
    let base = format!("postgres://postgres@127.0.0.1:{port}/postgres");
    match create_scratch_database(&base) {
        Ok((url, scratch)) => Ok(TestDatabase {
            url,
            scratch: Some(scratch),
            server: Some(server),
        }),
        Err(err) => {
            server.shutdown();
            Err(err)
        }
    }
}

fn spawn_local_server() -> Result<(LocalServer, u16)> {
    let initdb = find_binary("initdb")?;
    let postgres = find_binary("postgres")?;
    let pg_isready = find_binary("pg_isready")?;

    let data_dir = scratch_dir()?;
    let data_arg = data_dir
        .to_str()
        .context("data dir contains non-utf8 characters")?
        .to_string();

    let status = Command::new(&initdb)
        .args(["-D", &data_arg, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        let _ = fs::remove_dir_all(&data_dir);
        bail!("initdb exited with failure status");
    }

    let port = free_port()?;
    let process = Command::new(&postgres)
        .args(["-D", &data_arg, "-p", &port.to_string(), "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;
    let server = LocalServer { process, data_dir };

    if let Err(err) = wait_until_ready(&pg_isready, port) {
        server.shutdown();
        return Err(err);
    }
    Ok((server, port))
}

fn find_binary(name: &str) -> Result<PathBuf> {
    // Versioned Homebrew prefixes ship the full server toolchain that `initdb` needs.
    let preferred = [
        PathBuf::from("/opt/homebrew/opt/postgresql@16/bin"),
        PathBuf::from("/usr/local/opt/postgresql@16/bin"),
    ];
    let from_path = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    preferred
        .into_iter()
        .chain(from_path)
        .chain([
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/lib/postgresql/16/bin"),
        ])
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| anyhow!("{name} binary is required for Postgres tests"))
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    Ok(listener
        .local_addr()
        .context("failed to read listener address")?
        .port())
}

fn scratch_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("tessera-pg-{}", unique_suffix()));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    Ok(dir)
}

fn wait_until_ready(pg_isready: &Path, port: u16) -> Result<()> {
    let port = port.to_string();
    for _ in 0..READY_ATTEMPTS {
        let ready = Command::new(pg_isready)
            .args(["-h", "127.0.0.1", "-p", &port, "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if ready {
            return Ok(());
        }
        thread::sleep(READY_INTERVAL);
    }
    bail!("postgres process did not become ready in time")
}

fn create_scratch_database(base_url: &str) -> Result<(String, ScratchDatabase)> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;
    let name = format!("tessera_test_{}", unique_suffix());

    let mut target = parsed.clone();
    target.set_path(&format!("/{name}"));

    // Connect through the `postgres` maintenance database first, then the one supplied.
    let mut maintenance = parsed.clone();
    maintenance.set_path("/postgres");
    let mut candidates = vec![maintenance.to_string()];
    if maintenance.path() != parsed.path() {
        candidates.push(parsed.to_string());
    }

    let mut last_error = None;
    for admin_url in candidates {
        match run_admin(&admin_url, format!("CREATE DATABASE \"{name}\"")) {
            Ok(()) => {
                return Ok((target.to_string(), ScratchDatabase { admin_url, name }));
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("failed to create database")))
}

/// Run one administrative statement on a dedicated thread.
///
/// The blocking client owns a runtime of its own and must stay off any async
/// executor the calling test may be running on.
fn run_admin(admin_url: &str, statement: String) -> Result<()> {
    let admin_url = admin_url.to_string();
    thread::spawn(move || -> Result<()> {
        let mut client = postgres::Config::from_str(&admin_url)?.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to run `{statement}`"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("postgres admin thread panicked")))
}

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}_{nanos}", std::process::id())
}
