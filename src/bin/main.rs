use anyhow::{Context, Error};
use bugwise_client::{
    endpoints::{self, EndpointError},
    presentation, ApiClient, Config, FileStorage, Method, NewUser, Role,
    SessionStore, User,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| String::from(bugwise_client::DEFAULT_BASE_URL));
    log::debug!("Talking to the API at {}", base_url);
    url::Url::parse(&base_url)
        .with_context(|| format!("\"{}\" isn't a valid URL", base_url))?;

    let client = ApiClient::new(Config::new(base_url))?;
    let session = SessionStore::new(FileStorage::new(args.state_file()?));

    match args.cmd {
        Command::Login { username, password } => {
            login(&client, &session, &username, &password).await
        },
        Command::Logout => {
            session.clear()?;
            println!("Logged out");
            Ok(())
        },
        Command::Whoami => whoami(&session),
        Command::Register {
            username,
            email,
            password,
            role,
        } => {
            let mut new_user = NewUser::new(username, email, password);
            new_user.role = role;

            let user = endpoints::register(&client, &new_user).await?;
            println!("Registered {}", describe(&user));

            Ok(())
        },
        Command::Users(cmd) => users(&client, &session, cmd).await,
        Command::Request {
            method,
            endpoint,
            data,
        } => {
            let data: Option<Value> = match data {
                Some(raw) => Some(
                    serde_json::from_str(&raw)
                        .context("The payload must be valid JSON")?,
                ),
                None => None,
            };
            let token = session.token()?;

            let response = client
                .request(&endpoint, method, data.as_ref(), token.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);

            Ok(())
        },
    }
}

async fn login(
    client: &ApiClient,
    session: &SessionStore<FileStorage>,
    username: &str,
    password: &str,
) -> Result<(), Error> {
    let token = endpoints::login(client, username, password).await?;
    let user = endpoints::current_user(client, &token.access_token).await?;

    session.save_token(&token.access_token)?;
    session.save_user_data(&user)?;

    println!("Logged in as {}", describe(&user));
    Ok(())
}

fn whoami(session: &SessionStore<FileStorage>) -> Result<(), Error> {
    if !session.is_logged_in()? {
        println!("Not logged in");
        return Ok(());
    }

    match session.user_data::<User>()? {
        Some(user) => println!("{}", describe(&user)),
        None => println!("Logged in, but no profile was saved"),
    }

    Ok(())
}

async fn users(
    client: &ApiClient,
    session: &SessionStore<FileStorage>,
    cmd: UsersCommand,
) -> Result<(), Error> {
    let token = session
        .token()?
        .filter(|t| !t.is_empty())
        .context("You need to log in first")?;

    let result = match cmd {
        UsersCommand::List { skip, limit } => {
            endpoints::list_users(client, &token, skip, limit)
                .await
                .map(|users| {
                    for user in &users {
                        println!("{}", describe(user));
                    }
                })
        },
        UsersCommand::Get { id } => endpoints::get_user(client, &token, id)
            .await
            .map(|user| println!("{}", describe(&user))),
        UsersCommand::Delete { id } => {
            endpoints::delete_user(client, &token, id)
                .await
                .map(|_| println!("Deleted user {}", id))
        },
    };

    forget_rejected_token(session, result)
}

/// The server is the only one who knows when a token has expired, so throw
/// away our session when it says no.
fn forget_rejected_token(
    session: &SessionStore<FileStorage>,
    result: Result<(), EndpointError>,
) -> Result<(), Error> {
    match result {
        Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
            log::warn!("The server rejected our token, clearing the session");
            session.clear()?;
            Err(Error::from(e).context("Your session has expired"))
        },
        other => other.map_err(Error::from),
    }
}

fn describe(user: &User) -> String {
    let badge = presentation::role_badge_class(&user.role);

    format!(
        "#{} {} <{}> [{}{}]",
        user.id,
        user.username,
        user.email,
        user.role,
        if badge.is_empty() {
            String::new()
        } else {
            format!(", .{}", badge)
        },
    )
}

#[derive(Debug, StructOpt)]
struct Args {
    #[structopt(
        long = "base-url",
        help = "Where the BugWise API lives [default: http://localhost:8000]"
    )]
    base_url: Option<String>,
    #[structopt(
        long = "state",
        parse(from_os_str),
        help = "The file the session is saved to"
    )]
    state: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: Command,
}

impl Args {
    fn state_file(&self) -> Result<PathBuf, Error> {
        match self.state {
            Some(ref path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("bugwise").join("session.json"))
                .context("Unable to find a place to save the session"),
        }
    }
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "Log in and remember the session")]
    Login {
        #[structopt(short = "u", long = "username", help = "Your username")]
        username: String,
        #[structopt(short = "p", long = "password", help = "Your password")]
        password: String,
    },
    #[structopt(about = "Forget the saved session")]
    Logout,
    #[structopt(about = "Show the logged in user")]
    Whoami,
    #[structopt(about = "Create a new account")]
    Register {
        #[structopt(short = "u", long = "username")]
        username: String,
        #[structopt(short = "e", long = "email")]
        email: String,
        #[structopt(short = "p", long = "password")]
        password: String,
        #[structopt(long = "role", default_value = "viewer")]
        role: Role,
    },
    #[structopt(about = "Manage users")]
    Users(UsersCommand),
    #[structopt(about = "Send an arbitrary request to the API")]
    Request {
        #[structopt(help = "GET, POST, PUT, DELETE or PATCH")]
        method: Method,
        #[structopt(help = "The path to request, e.g. /api/v1/users/me")]
        endpoint: String,
        #[structopt(long = "data", help = "A JSON payload")]
        data: Option<String>,
    },
}

#[derive(Debug, StructOpt)]
enum UsersCommand {
    List {
        #[structopt(long = "skip", default_value = "0")]
        skip: usize,
        #[structopt(long = "limit", default_value = "10")]
        limit: usize,
    },
    Get {
        id: u64,
    },
    Delete {
        id: u64,
    },
}
