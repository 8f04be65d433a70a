use std::path::PathBuf;

use clap::{ArgGroup, Args};
use common::prelude::{HostIdentityPolicy, KeyMaterial};

use crate::state::{AppConfig, AppState, DbConfig, SshConfig};

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("host_identity")
        .required(true)
        .args(["host_fingerprint", "accept_any_host_key"])
))]
pub struct Init {
    /// Directory tree to back up
    #[arg(long)]
    pub site: PathBuf,

    /// MySQL user
    #[arg(long)]
    pub db_username: String,

    /// MySQL password (prefer BACKUPER_DB_PASSWORD at run time)
    #[arg(long, default_value = "")]
    pub db_password: String,

    /// MySQL host
    #[arg(long, default_value = "127.0.0.1")]
    pub db_host: String,

    /// MySQL port
    #[arg(long, default_value_t = common::dump::DEFAULT_MYSQL_PORT)]
    pub db_port: u16,

    /// Database to export
    #[arg(long)]
    pub db_name: String,

    /// Dump client binary
    #[arg(long, default_value = common::dump::DEFAULT_DUMP_PROGRAM)]
    pub dump_program: PathBuf,

    /// SSH login on the backup host
    #[arg(long)]
    pub ssh_username: String,

    /// Backup host as host:port
    #[arg(long)]
    pub remote: String,

    /// Private key file used to authenticate
    #[arg(long)]
    pub ssh_key: PathBuf,

    /// Existing remote directory for uploads (default: /home/<ssh-username>)
    #[arg(long)]
    pub destination: Option<String>,

    /// Connect and I/O timeout, in seconds
    #[arg(long, default_value_t = common::transfer::DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Only trust a host presenting exactly this key, as "<algorithm> <base64>"
    #[arg(long)]
    pub host_fingerprint: Option<String>,

    /// Trust any host key; every connection logs the key it accepted
    #[arg(long)]
    pub accept_any_host_key: bool,
}

impl Init {
    fn host_identity(&self) -> HostIdentityPolicy {
        match &self.host_fingerprint {
            Some(fingerprint) => HostIdentityPolicy::pinned(fingerprint.clone()),
            None => HostIdentityPolicy::Unverified,
        }
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            site: self.site.clone(),
            db: DbConfig {
                username: self.db_username.clone(),
                password: self.db_password.clone(),
                hostname: self.db_host.clone(),
                port: self.db_port,
                name: self.db_name.clone(),
                dump_program: self.dump_program.clone(),
            },
            ssh: SshConfig {
                username: self.ssh_username.clone(),
                remote: self.remote.clone(),
                timeout_secs: self.timeout_secs,
                destination: self.destination.clone(),
                passphrase: None,
                key: KeyMaterial::Path(self.ssh_key.clone()),
                host_identity: self.host_identity(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::init(ctx.config_path.clone(), self.config())?;

        if state.config.ssh.host_identity == HostIdentityPolicy::Unverified {
            tracing::warn!(
                "host key verification disabled; pin a fingerprint in the config to enable it"
            );
        }

        let destination = common::pipeline::remote_destination(
            state.config.ssh.destination.as_deref(),
            &state.config.ssh.username,
            "<archive>",
        );

        let output = format!(
            "Initialized backuper directory at: {}\n\
             - Config: {}\n\
             - Temporary files: {}\n\
             - Backups: {}\n\
             - Site: {}\n\
             - Database: {}@{}:{}/{}\n\
             - Remote: {}@{}:{}\n\
             - Host identity: {}",
            state.backuper_dir.display(),
            state.config_path.display(),
            state.layout.tmp.display(),
            state.layout.backups.display(),
            state.config.site.display(),
            state.config.db.username,
            state.config.db.hostname,
            state.config.db.port,
            state.config.db.name,
            state.config.ssh.username,
            state.config.ssh.remote,
            destination,
            state.config.ssh.host_identity
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Args, Parser};
    use crate::op::{Op, OpContext};
    use crate::Command;
    use tempfile::TempDir;

    const BASE: [&str; 12] = [
        "backuper",
        "init",
        "--site",
        "/var/www",
        "--db-username",
        "root",
        "--db-name",
        "shop",
        "--ssh-username",
        "ubuntu",
        "--remote",
        "10.0.0.5:22",
    ];

    fn parse(extra: &[&str]) -> Result<Init, clap::Error> {
        let mut argv: Vec<&str> = BASE.to_vec();
        argv.extend(["--ssh-key", "/root/.ssh/id_ed25519"]);
        argv.extend(extra);
        match Args::try_parse_from(argv)?.command {
            Command::Init(init) => Ok(init),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_host_identity_choice_required() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        assert!(parse(&["--host-fingerprint", "ssh-rsa AAAA", "--accept-any-host-key"]).is_err());
    }

    #[test]
    fn test_pinned_fingerprint() {
        let init = parse(&["--host-fingerprint", "ssh-ed25519 AAAAC3Nz"]).unwrap();
        let config = init.config();
        assert_eq!(
            config.ssh.host_identity,
            HostIdentityPolicy::pinned("ssh-ed25519 AAAAC3Nz")
        );
        assert_eq!(config.db.port, 3306);
        assert_eq!(config.db.hostname, "127.0.0.1");
        assert_eq!(config.ssh.timeout_secs, 120);
    }

    #[tokio::test]
    async fn test_init_writes_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("backuper");
        let init = parse(&["--accept-any-host-key", "--destination", "/srv/backups"]).unwrap();

        let output = init
            .execute(&OpContext::new(Some(dir.clone()), false))
            .await
            .unwrap();
        assert!(output.contains("/srv/backups/<archive>"));

        let state = AppState::load_with(Some(dir), |_| None).unwrap();
        assert_eq!(state.config.ssh.host_identity, HostIdentityPolicy::Unverified);
        assert_eq!(state.config.site, PathBuf::from("/var/www"));
    }
}
