//! Fetching and compiling MIB modules that are not available locally.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::MibError;
use crate::mib::module_path;

/// Remote ASN.1 MIB repository; `@mib@` is replaced by the module name.
pub const DEFAULT_MIB_SOURCE: &str = "http://mibs.snmplabs.com:80/asn1/@mib@";

/// Compiler producing JSON modules from ASN.1 sources.
pub const DEFAULT_MIB_COMPILER: &str = "mibdump";

/// Sub-directory of the target directory holding downloaded sources.
const SOURCES_DIR: &str = "asn1";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Makes a MIB module available as `<target>/<MIB>.json`.
///
/// Fetching blocks on network and process I/O; async code calls it from
/// `tokio::task::spawn_blocking`.
pub trait MibFetcher: Send + Sync + std::fmt::Debug {
    fn fetch(&self, mib: &str, target: &Path) -> Result<(), MibError>;
}

/// Default directory fetched MIBs are compiled into.
pub fn default_fetch_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("integrations")
        .join("snmp")
        .join("mibs")
}

/// Downloads ASN.1 sources over HTTP and compiles them with `mibdump`.
#[derive(Debug, Clone)]
pub struct RemoteMibFetcher {
    source: String,
    compiler: PathBuf,
    timeout: Duration,
}

impl Default for RemoteMibFetcher {
    fn default() -> Self {
        Self {
            source: DEFAULT_MIB_SOURCE.to_string(),
            compiler: PathBuf::from(DEFAULT_MIB_COMPILER),
            timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

impl RemoteMibFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another repository URL template (must contain `@mib@`).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Use another compiler executable.
    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    /// URL a module is downloaded from.
    pub fn source_url(&self, mib: &str) -> String {
        self.source.replace("@mib@", mib)
    }

    fn error(mib: &str, message: impl Into<String>) -> MibError {
        MibError::Fetch {
            mib: mib.to_string(),
            message: message.into(),
        }
    }

    fn download(&self, mib: &str, sources: &Path) -> Result<PathBuf, MibError> {
        let url = self.source_url(mib);
        tracing::debug!(mib = %mib, url = %url, "Downloading MIB");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Self::error(mib, e.to_string()))?;

        let body = client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|e| Self::error(mib, format!("download from {} failed: {}", url, e)))?;

        std::fs::create_dir_all(sources)?;
        let path = sources.join(mib);
        std::fs::write(&path, &body)?;

        Ok(path)
    }

    fn compile(&self, mib: &str, sources: &Path, target: &Path) -> Result<(), MibError> {
        tracing::debug!(mib = %mib, compiler = %self.compiler.display(), "Compiling MIB");

        // Imports missing from the download cache are pulled from the
        // repository by the compiler itself.
        let output = Command::new(&self.compiler)
            .arg("--destination-format")
            .arg("json")
            .arg("--destination-directory")
            .arg(target)
            .arg("--mib-source")
            .arg(format!("file://{}", sources.display()))
            .arg("--mib-source")
            .arg(&self.source)
            .arg(mib)
            .output()
            .map_err(|e| {
                Self::error(
                    mib,
                    format!("failed to run {}: {}", self.compiler.display(), e),
                )
            })?;

        if !output.status.success() {
            return Err(Self::error(
                mib,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        if !module_path(target, mib).is_file() {
            return Err(Self::error(
                mib,
                format!("compiler produced no {}.json", mib),
            ));
        }

        Ok(())
    }
}

impl MibFetcher for RemoteMibFetcher {
    fn fetch(&self, mib: &str, target: &Path) -> Result<(), MibError> {
        std::fs::create_dir_all(target)?;
        let sources = target.join(SOURCES_DIR);
        self.download(mib, &sources)?;
        self.compile(mib, &sources, target)?;

        tracing::info!(mib = %mib, target = %target.display(), "Fetched MIB");
        Ok(())
    }
}

/// Fetcher for deployments without network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMibFetcher;

impl MibFetcher for NoopMibFetcher {
    fn fetch(&self, mib: &str, _target: &Path) -> Result<(), MibError> {
        Err(MibError::Fetch {
            mib: mib.to_string(),
            message: "MIB fetching is disabled".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url() {
        let fetcher = RemoteMibFetcher::new();
        assert_eq!(
            fetcher.source_url("CISCO-PROCESS-MIB"),
            "http://mibs.snmplabs.com:80/asn1/CISCO-PROCESS-MIB"
        );

        let mirror = RemoteMibFetcher::new().with_source("https://mirror.local/mibs/@mib@.txt");
        assert_eq!(mirror.source_url("IF-MIB"), "https://mirror.local/mibs/IF-MIB.txt");
    }

    #[test]
    fn test_missing_compiler_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join(SOURCES_DIR);
        std::fs::create_dir_all(&sources).unwrap();

        let fetcher = RemoteMibFetcher::new().with_compiler("/nonexistent/mibdump");
        let err = fetcher.compile("ACME-MIB", &sources, dir.path()).unwrap_err();
        assert!(err.to_string().contains("failed to run /nonexistent/mibdump"));
    }

    #[test]
    fn test_noop_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NoopMibFetcher.fetch("IF-MIB", dir.path()).is_err());
    }

    #[test]
    fn test_default_fetch_directory() {
        assert!(default_fetch_directory().ends_with("integrations/snmp/mibs"));
    }
}
