//! Database export collaborators.
//!
//! The pipeline only needs something that, given a target directory, either
//! produces one completed dump file there or fails. [`MysqlDump`] does this by
//! driving the `mysqldump` client.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;

use crate::naming::{Clock, NamedArtifact};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_DUMP_PROGRAM: &str = "mysqldump";
pub const DUMP_EXT: &str = "sql";

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("dump file {0} is missing after export")]
    Missing(PathBuf),
    #[error("dump failed: {0}")]
    Other(String),
    #[error("dump i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A completed database export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpArtifact {
    pub path: PathBuf,
    pub size: u64,
}

impl DumpArtifact {
    /// Stat an existing dump file
    pub fn from_path(path: PathBuf) -> Result<Self, DumpError> {
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(DumpError::Missing(path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DumpError::Missing(path))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            size: metadata.len(),
        })
    }
}

/// Produces a single dump file for one database.
///
/// Implementations must never report a partially written file as success.
pub trait DumpSource: Send + Sync {
    fn dump(&self, target_dir: &Path) -> Result<DumpArtifact, DumpError>;
}

/// MySQL / MariaDB export through the `mysqldump` client.
///
/// Output goes to a hidden `.partial` file that is renamed to
/// `<database>-<YYYYMMDDTHHMMSS>.sql` only once the client exits cleanly.
#[derive(Clone)]
pub struct MysqlDump {
    username: String,
    password: String,
    hostname: String,
    port: u16,
    database: String,
    program: PathBuf,
    clock: Clock,
}

impl fmt::Debug for MysqlDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlDump")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("program", &self.program)
            .finish()
    }
}

impl MysqlDump {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        database: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            port,
            database: database.into(),
            program: PathBuf::from(DEFAULT_DUMP_PROGRAM),
            clock: Clock::system(),
        }
    }

    /// Use a different client binary (e.g. `mariadb-dump` or an absolute path)
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }


    /// Build the client invocation writing to `result_file`.
    /// The password travels in `MYSQL_PWD`, never on the command line.
    fn command(&self, result_file: &Path) -> Command {
        let mut result_arg = OsString::from("--result-file=");
        result_arg.push(result_file);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--host")
            .arg(&self.hostname)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--user")
            .arg(&self.username)
            .arg("--single-transaction")
            .arg("--routines")
            .arg(result_arg)
            .arg(&self.database)
            .env("MYSQL_PWD", &self.password)
            .stdin(Stdio::null());
        cmd
    }
}

impl DumpSource for MysqlDump {
    fn dump(&self, target_dir: &Path) -> Result<DumpArtifact, DumpError> {
        let name = NamedArtifact::now(&format!("{}-", self.database), DUMP_EXT, &self.clock);
        let final_path = name.path_in(target_dir);
        let partial_path = target_dir.join(format!(".{}.partial", name));
        let program = self.program.display().to_string();

        tracing::debug!(
            program = %program,
            host = %self.hostname,
            port = self.port,
            database = %self.database,
            "running database dump"
        );

        let output = self
            .command(&partial_path)
            .output()
            .map_err(|source| DumpError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let _ = fs::remove_file(&partial_path);
            return Err(DumpError::Failed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !partial_path.is_file() {
            return Err(DumpError::Missing(partial_path));
        }
        fs::rename(&partial_path, &final_path)?;

        DumpArtifact::from_path(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn fixed_dump(program: &str) -> MysqlDump {
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 3, 2)
            .unwrap();
        MysqlDump::new("backup", "s3cret", "db.local", "shop", 3307)
            .with_program(program)
            .with_clock(Clock::fixed(at))
    }

    #[test]
    fn test_command_keeps_password_out_of_args() {
        let dump = fixed_dump("mysqldump");
        let cmd = dump.command(Path::new("/tmp/out.partial"));

        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--host",
                "db.local",
                "--port",
                "3307",
                "--user",
                "backup",
                "--single-transaction",
                "--routines",
                "--result-file=/tmp/out.partial",
                "shop",
            ]
        );
        assert!(!args.iter().any(|a| a.contains("s3cret")));

        let pwd = cmd
            .get_envs()
            .find(|(k, _)| *k == "MYSQL_PWD")
            .and_then(|(_, v)| v)
            .unwrap();
        assert_eq!(pwd, "s3cret");
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", fixed_dump("mysqldump"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_dump_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let result = fixed_dump("false").dump(dir.path());

        assert!(matches!(result, Err(DumpError::Failed { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_without_output_is_missing() {
        let dir = TempDir::new().unwrap();
        let result = fixed_dump("true").dump(dir.path());

        assert!(matches!(result, Err(DumpError::Missing(_))));
        assert!(!dir.path().join("shop-20240115T140302.sql").exists());
    }

    #[test]
    fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let result = fixed_dump("/nonexistent/mysqldump").dump(dir.path());
        assert!(matches!(result, Err(DumpError::Spawn { .. })));
    }

    #[test]
    fn test_artifact_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sql");
        fs::write(&path, "CREATE TABLE t;").unwrap();

        let artifact = DumpArtifact::from_path(path.clone()).unwrap();
        assert_eq!(artifact.path, path);
        assert_eq!(artifact.size, 15);

        let missing = DumpArtifact::from_path(dir.path().join("nope.sql"));
        assert!(matches!(missing, Err(DumpError::Missing(_))));
    }
}
