use clap::Parser;
use htrealm::{
    AuthTester, Error, HtpasswdConfig, HtpasswdGroupResolver, HtpasswdRealm, InMemoryConfigStore,
    SourceRegistry, UserProfile, UserSync,
};
use snafu::ResultExt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Check credentials against htpasswd, htgroup and htmeta files.
#[derive(Parser)]
#[command(name = "htrealm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log cache and lookup activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log a user in and print the resulting profile
    Authenticate {
        #[command(flatten)]
        files: Files,
        /// Username to authenticate
        username: String,
        /// Read password from stdin instead of prompting
        #[arg(long)]
        password: bool,
    },

    /// Print the groups of a user, one per line
    Groups {
        #[command(flatten)]
        files: Files,
        /// Username to resolve
        username: String,
    },

    /// Dry-run a configuration and report where a login stops
    Test {
        #[command(flatten)]
        files: Files,
        /// Username to try
        username: String,
        /// Read password from stdin instead of prompting
        #[arg(long)]
        password: bool,
    },
}

#[derive(clap::Args)]
struct Files {
    /// TOML configuration file
    #[arg(long, short, conflicts_with_all = ["htpasswd", "htgroup", "htmeta"])]
    config: Option<PathBuf>,
    /// Path to the htpasswd file
    #[arg(long)]
    htpasswd: Option<PathBuf>,
    /// Path to the htgroup file
    #[arg(long)]
    htgroup: Option<PathBuf>,
    /// Path to the htmeta file
    #[arg(long)]
    htmeta: Option<PathBuf>,
}

impl Files {
    /// Configuration from the TOML file, or an enabled one built from the
    /// individual paths (unset paths stay empty).
    fn load(self) -> Result<HtpasswdConfig> {
        match self.config {
            Some(path) => {
                HtpasswdConfig::from_toml_file(path).whatever_context("Can't load configuration")
            }
            None => Ok(HtpasswdConfig::new(
                self.htpasswd.unwrap_or_default(),
                self.htgroup.unwrap_or_default(),
                self.htmeta.unwrap_or_default(),
            )),
        }
    }
}

/// Reports synchronized users through the log.
struct LogSync;

impl UserSync for LogSync {
    fn store(&self, user: &UserProfile) {
        tracing::info!(%user, "user synchronized");
    }
}

type Result<T> = ::std::result::Result<T, snafu::Whatever>;

fn read_password_from_stdin() -> Result<Zeroizing<String>> {
    let mut password = Zeroizing::new(String::new());
    io::stdin()
        .read_to_string(&mut password)
        .whatever_context("Can't read password from stdin")?;
    Ok(Zeroizing::new(password.trim_end().to_string()))
}

fn prompt_password() -> Result<Zeroizing<String>> {
    rpassword::prompt_password("Enter password: ")
        .whatever_context("Can't prompt for password")
        .map(Zeroizing::new)
}

fn read_password(from_stdin: bool) -> Result<Zeroizing<String>> {
    if from_stdin {
        read_password_from_stdin()
    } else {
        prompt_password()
    }
}

fn print_user(user: &UserProfile) {
    println!("name: {}", user.name);
    println!("display name: {}", user.display_name);
    if let Some(mail) = &user.mail {
        println!("mail: {mail}");
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let sources = Arc::new(SourceRegistry::new());

    match cli.command {
        Commands::Authenticate {
            files,
            username,
            password: from_stdin,
        } => {
            let config = files.load()?;
            let password = read_password(from_stdin)?;

            let store = Arc::new(InMemoryConfigStore::with_config(config));
            let realm = HtpasswdRealm::new(store, Arc::new(LogSync), sources);

            match realm.authenticate(&username, &password) {
                Ok(Some(info)) => {
                    print_user(&info.user);
                    Ok(())
                }
                Ok(None) => snafu::whatever!("htpasswd realm is disabled"),
                Err(e @ Error::AuthenticationFailed { .. }) => {
                    snafu::whatever!("user {}: {}", username, e)
                }
                Err(e) => Err(e).whatever_context(format!("user {username}: can't authenticate")),
            }
        }

        Commands::Groups { files, username } => {
            let config = files.load()?;
            snafu::ensure_whatever!(config.enabled, "htpasswd realm is disabled");

            for group in HtpasswdGroupResolver::from_config(config, sources).resolve(&username) {
                println!("{group}");
            }
            Ok(())
        }

        Commands::Test {
            files,
            username,
            password: from_stdin,
        } => {
            let config = files.load()?;
            let password = read_password(from_stdin)?;

            let result = AuthTester::new(config, sources).test(&username, &password);
            if let Some(user) = &result.user {
                print_user(user);
            }
            match result.failure {
                None => {
                    let groups: Vec<_> = result.groups.into_iter().collect();
                    println!("groups: {}", groups.join(" "));
                    Ok(())
                }
                Some(failure) => {
                    println!("configured: {}", failure.configured);
                    println!("user found: {}", failure.user_found);
                    println!("user authenticated: {}", failure.user_authenticated);
                    if let Some(exception) = &failure.exception {
                        println!("error: {exception}");
                    }
                    snafu::whatever!("user {}: test failed", username)
                }
            }
        }
    }
}

#[snafu::report]
fn main() -> Result<()> {
    run()
}
