use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use collegehub::config::ConfigError;
use collegehub::net::types::{
    Booking, College, CollegeFilter, NewBooking, NewReview, ProfileUpdate, ResetPasswordRequest, ReviewUpdate,
};
use collegehub::validate;
use collegehub::{ApiClient, ApiError, ClientConfig, FileStore, SessionContext, SessionStore};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    AuthFailed(String),
    #[error("not logged in; run `collegehub login` first")]
    NotLoggedIn,
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "collegehub", about = "Browse colleges, apply for admission and manage reviews")]
struct Cli {
    /// Backend origin; overrides COLLEGEHUB_API_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Session document path; overrides COLLEGEHUB_SESSION_FILE.
    #[arg(long)]
    session_file: Option<String>,

    /// Print colleges and bookings as one summary line each instead of JSON.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COLLEGEHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "COLLEGEHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with an email already verified by an external provider.
    SocialLogin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "google")]
        provider: String,
    },
    /// Ask the backend for a password reset token.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long, env = "COLLEGEHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Profile(ProfileCommand),
    Colleges(CollegesCommand),
    Bookings(BookingsCommand),
    Reviews(ReviewsCommand),
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, requires = "new_password")]
        current_password: Option<String>,
        #[arg(long, requires = "current_password")]
        new_password: Option<String>,
    },
}

#[derive(Args, Debug)]
struct CollegesCommand {
    #[command(subcommand)]
    command: CollegesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CollegesSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "type")]
        college_type: Option<String>,
        #[arg(long)]
        min_rating: Option<f64>,
        #[arg(long)]
        sort_by: Option<String>,
    },
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct BookingsCommand {
    #[command(subcommand)]
    command: BookingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BookingsSubcommand {
    List,
    Show {
        id: String,
    },
    Create(BookingArgs),
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct BookingArgs {
    #[arg(long)]
    college_id: String,
    #[arg(long)]
    student_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    course: String,
    #[arg(long)]
    previous_education: String,
    #[arg(long)]
    grade: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    guardian_name: Option<String>,
    #[arg(long)]
    guardian_phone: Option<String>,
}

#[derive(Args, Debug)]
struct ReviewsCommand {
    #[command(subcommand)]
    command: ReviewsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ReviewsSubcommand {
    College {
        college_id: String,
    },
    Mine,
    Create {
        #[arg(long)]
        college_id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: String,
    },
    Update {
        id: String,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        comment: Option<String>,
    },
    Delete {
        id: String,
    },
}

type Session = SessionContext<ApiClient>;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::from_env_or(cli.base_url, cli.session_file)?;
    tracing::debug!(api_url = %config.api_url, session_file = %config.session_file.display(), "config resolved");

    let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(&config.session_file));
    let api = ApiClient::new(&config.api_url, store.clone())?;
    let mut session = SessionContext::new(api, store);
    session.initialize().await;

    match cli.command {
        Command::Login { email, password } => run_login(&mut session, &email, &password).await,
        Command::Signup { name, email, password } => run_signup(&mut session, &name, &email, &password).await,
        Command::SocialLogin { email, name, provider } => {
            run_social_login(&mut session, &email, name.as_deref(), &provider).await
        }
        Command::ForgotPassword { email } => {
            check(validate::validate_email(&email), "email", "not a valid address")?;
            print_json(&session.api().forgot_password(&email).await?)
        }
        Command::ResetPassword { token, password } => {
            check(validate::validate_required(&token), "token", "required")?;
            check(validate::validate_password(&password), "password", "must be at least 6 characters")?;
            print_json(&session.api().reset_password(&ResetPasswordRequest { token, password }).await?)
        }
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let user = session.user().ok_or(CliError::NotLoggedIn)?;
            print_json(user)
        }
        Command::Profile(profile) => run_profile(&mut session, profile).await,
        Command::Colleges(colleges) => run_colleges(&session, colleges, cli.plain).await,
        Command::Bookings(bookings) => run_bookings(&session, bookings, cli.plain).await,
        Command::Reviews(reviews) => run_reviews(&session, reviews).await,
    }
}

async fn run_login(session: &mut Session, email: &str, password: &str) -> Result<(), CliError> {
    check(validate::validate_email(email), "email", "not a valid address")?;
    check(validate::validate_required(password), "password", "required")?;

    if !session.login(email, password).await {
        return Err(auth_failure(session, "login failed"));
    }
    let user = session.user().ok_or(CliError::NotLoggedIn)?;
    print_json(user)
}

async fn run_signup(session: &mut Session, name: &str, email: &str, password: &str) -> Result<(), CliError> {
    check(validate::validate_required(name), "name", "required")?;
    check(validate::validate_email(email), "email", "not a valid address")?;
    check(validate::validate_password(password), "password", "must be at least 6 characters")?;

    if !session.signup(name, email, password).await {
        return Err(auth_failure(session, "signup failed"));
    }
    let user = session.user().ok_or(CliError::NotLoggedIn)?;
    print_json(user)
}

async fn run_social_login(
    session: &mut Session,
    email: &str,
    name: Option<&str>,
    provider: &str,
) -> Result<(), CliError> {
    check(validate::validate_email(email), "email", "not a valid address")?;
    check(validate::validate_required(provider), "provider", "required")?;

    if !session.social_login(email, name, provider).await {
        return Err(auth_failure(session, "social login failed"));
    }
    let user = session.user().ok_or(CliError::NotLoggedIn)?;
    print_json(user)
}

async fn run_profile(session: &mut Session, profile: ProfileCommand) -> Result<(), CliError> {
    require_login(session)?;
    match profile.command {
        ProfileSubcommand::Update { name, phone, address, current_password, new_password } => {
            if let Some(name) = &name {
                check(validate::validate_required(name), "name", "must not be blank")?;
            }
            if let Some(phone) = &phone {
                check(validate::validate_phone(phone), "phone", "expected at least 10 digits")?;
            }
            if let Some(new_password) = &new_password {
                check(validate::validate_password(new_password), "new password", "must be at least 6 characters")?;
            }
            let update = ProfileUpdate { name, phone, address, current_password, new_password };
            let user = session.update_profile(&update).await?;
            print_json(&user)
        }
    }
}

async fn run_colleges(session: &Session, colleges: CollegesCommand, plain: bool) -> Result<(), CliError> {
    let api = session.api();
    match colleges.command {
        CollegesSubcommand::List { search, college_type, min_rating, sort_by } => {
            if let Some(kind) = &college_type {
                check_college_type(kind)?;
            }
            let filter = CollegeFilter { search, college_type, min_rating, sort_by };
            let list = api.list_colleges(&filter).await?;
            if plain {
                list.iter().for_each(|college| println!("{}", college_line(college)));
                return Ok(());
            }
            print_json(&list)
        }
        CollegesSubcommand::Show { id } => {
            let college = api.get_college(&id).await?;
            if plain {
                println!("{}", college_line(&college));
                return Ok(());
            }
            print_json(&college)
        }
        CollegesSubcommand::Create { data } => {
            require_login(session)?;
            let body = parse_object(&data)?;
            print_json(&api.create_college(&body).await?)
        }
        CollegesSubcommand::Update { id, data } => {
            require_login(session)?;
            let body = parse_object(&data)?;
            print_json(&api.update_college(&id, &body).await?)
        }
        CollegesSubcommand::Delete { id } => {
            require_login(session)?;
            print_json(&api.delete_college(&id).await?)
        }
    }
}

async fn run_bookings(session: &Session, bookings: BookingsCommand, plain: bool) -> Result<(), CliError> {
    require_login(session)?;
    let api = session.api();
    match bookings.command {
        BookingsSubcommand::List => {
            let list = api.list_bookings().await?;
            for booking in &list {
                tracing::debug!(
                    booking_id = booking.id.as_deref().unwrap_or("-"),
                    college = booking.college_id.display_name(),
                    status = booking.status.as_str(),
                    "booking"
                );
            }
            if plain {
                list.iter().for_each(|booking| println!("{}", booking_line(booking)));
                return Ok(());
            }
            print_json(&list)
        }
        BookingsSubcommand::Show { id } => {
            let booking = api.get_booking(&id).await?;
            if plain {
                println!("{}", booking_line(&booking));
                return Ok(());
            }
            print_json(&booking)
        }
        BookingsSubcommand::Create(args) => {
            let booking = new_booking(args)?;
            print_json(&api.create_booking(&booking).await?)
        }
        BookingsSubcommand::Update { id, data } => {
            let body = parse_object(&data)?;
            check_booking_status(&body)?;
            print_json(&api.update_booking(&id, &body).await?)
        }
        BookingsSubcommand::Delete { id } => print_json(&api.delete_booking(&id).await?),
    }
}

async fn run_reviews(session: &Session, reviews: ReviewsCommand) -> Result<(), CliError> {
    let api = session.api();
    match reviews.command {
        ReviewsSubcommand::College { college_id } => print_json(&api.college_reviews(&college_id).await?),
        ReviewsSubcommand::Mine => {
            require_login(session)?;
            print_json(&api.my_reviews().await?)
        }
        ReviewsSubcommand::Create { college_id, rating, comment } => {
            require_login(session)?;
            check(validate::validate_rating(rating), "rating", "must be between 1 and 5")?;
            check(validate::validate_required(&comment), "comment", "required")?;
            let review = NewReview { college_id, rating, comment };
            print_json(&api.create_review(&review).await?)
        }
        ReviewsSubcommand::Update { id, rating, comment } => {
            require_login(session)?;
            if let Some(rating) = rating {
                check(validate::validate_rating(rating), "rating", "must be between 1 and 5")?;
            }
            print_json(&api.update_review(&id, &ReviewUpdate { rating, comment }).await?)
        }
        ReviewsSubcommand::Delete { id } => {
            require_login(session)?;
            print_json(&api.delete_review(&id).await?)
        }
    }
}

fn new_booking(args: BookingArgs) -> Result<NewBooking, CliError> {
    for (field, value) in [
        ("college id", &args.college_id),
        ("student name", &args.student_name),
        ("course", &args.course),
        ("previous education", &args.previous_education),
        ("grade", &args.grade),
        ("address", &args.address),
    ] {
        check(validate::validate_required(value), field, "required")?;
    }
    check(validate::validate_email(&args.email), "email", "not a valid address")?;
    check(validate::validate_phone(&args.phone), "phone", "expected at least 10 digits")?;
    if let Some(guardian_phone) = &args.guardian_phone {
        check(validate::validate_phone(guardian_phone), "guardian phone", "expected at least 10 digits")?;
    }

    Ok(NewBooking {
        college_id: args.college_id,
        student_name: args.student_name,
        email: args.email,
        phone: args.phone,
        course: args.course,
        previous_education: args.previous_education,
        grade: args.grade,
        address: args.address,
        guardian_name: args.guardian_name,
        guardian_phone: args.guardian_phone,
    })
}

fn check_college_type(kind: &str) -> Result<(), CliError> {
    let known = validate::COLLEGE_TYPES.contains(&kind);
    check(known, "type", &format!("expected one of {}", validate::COLLEGE_TYPES.join(", ")))
}

/// A booking update may only move `status` to one of the known values.
fn check_booking_status(body: &Value) -> Result<(), CliError> {
    let Some(status) = body.get("status") else {
        return Ok(());
    };
    let known = status.as_str().is_some_and(|s| validate::BOOKING_STATUSES.contains(&s));
    check(known, "status", &format!("expected one of {}", validate::BOOKING_STATUSES.join(", ")))
}

fn college_line(college: &College) -> String {
    let mut line = format!(
        "{}  {} ({})  {}  rating {:.1}",
        college.id.as_deref().unwrap_or("-"),
        college.name,
        college.college_type,
        college.location,
        college.rating
    );
    if let Some(fee) = college.tuition_fee {
        line.push_str(&format!("  tuition {}", validate::format_currency(fee)));
    }
    line
}

fn booking_line(booking: &Booking) -> String {
    let submitted = booking.created_at.as_deref().map_or_else(|| "-".to_owned(), validate::format_date);
    format!(
        "{}  {}  {}  {}  submitted {}",
        booking.id.as_deref().unwrap_or("-"),
        booking.college_id.display_name(),
        booking.status.as_str(),
        validate::format_phone_number(&booking.phone),
        submitted
    )
}

fn require_login(session: &Session) -> Result<(), CliError> {
    if session.is_authenticated() { Ok(()) } else { Err(CliError::NotLoggedIn) }
}

fn auth_failure(session: &Session, fallback: &str) -> CliError {
    CliError::AuthFailed(session.last_error().unwrap_or(fallback).to_owned())
}

fn check(ok: bool, field: &'static str, reason: &str) -> Result<(), CliError> {
    if ok { Ok(()) } else { Err(CliError::InvalidInput { field, reason: reason.to_owned() }) }
}

fn parse_object(raw: &str) -> Result<Value, CliError> {
    let value = serde_json::from_str::<Value>(raw)?;
    if !value.is_object() {
        return Err(CliError::InvalidInput { field: "data", reason: "expected a JSON object".to_owned() });
    }
    Ok(value)
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
