use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::debug;

use fireshow::catalog::filters::{FilterState, SortDirection, ALL};
use fireshow::catalog::view::CatalogView;
use fireshow::catalog::{self, categories, effects};
use fireshow::config::{self, FireshowConfig};
use fireshow::db::models::{NewProduct, Product};
use fireshow::db::Database;
use fireshow::ingest::{self, product::RawProduct};
use fireshow::output::{json as json_out, table};
use fireshow::quotes::{QuoteForm, QuoteStatus};
use fireshow::session::{sign_in, Role, Session, SessionEvent};
use fireshow::sync::{self, SyncOptions};

#[derive(Parser)]
#[command(name = "fireshow", version, about = "Fireworks catalog, quote requests and staff tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.fireshow/fireshow.db)
    #[arg(long, global = true, env = "FIRESHOW_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog through the filter pipeline
    List {
        /// Match name, code or manufacturer (case-insensitive substring)
        #[arg(long)]
        search: Option<String>,

        /// Category, or "all"
        #[arg(long, default_value = ALL)]
        category: String,

        /// Effect, or "all"
        #[arg(long, default_value = ALL)]
        effect: String,

        /// Sort by price: asc, desc or none
        #[arg(long, default_value = "none")]
        sort_price: String,

        /// Sort by duration: asc, desc or none (applied after price)
        #[arg(long, default_value = "none")]
        sort_duration: String,

        /// Include inactive products
        #[arg(long)]
        all: bool,

        /// Maximum results to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Browse the catalog interactively (type to search, :help for commands)
    Browse {
        /// Include inactive products
        #[arg(long)]
        all: bool,
    },

    /// Show product details
    Show {
        /// Product ID
        id: String,
    },

    /// Import products from JSON or YAML files, directories or globs
    Import {
        /// File, directory or glob paths
        paths: Vec<String>,

        /// Force format: json, yaml
        #[arg(long)]
        format: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Edit the catalog
    #[command(subcommand)]
    Product(ProductCommands),

    /// Quote requests
    #[command(subcommand)]
    Quote(QuoteCommands),

    /// Manage the staff directory
    #[command(subcommand)]
    Staff(StaffCommands),

    /// Sign in as a staff member
    Login {
        email: String,
    },

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami,

    /// Reconcile the local catalog with the hosted backend
    Sync {
        /// API key (overrides env var and config)
        #[arg(long)]
        api_key: Option<String>,

        /// Preview without changing the local catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show database statistics
    Stats,
}

#[derive(Args)]
struct ProductFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    code: Option<String>,
    #[arg(long)]
    manufacturer: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    effect: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    /// Duration in seconds
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    image_url: Option<String>,
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Add a product
    Add {
        /// Product ID (default: generated)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        fields: ProductFields,

        /// Add as inactive (hidden from the public list)
        #[arg(long)]
        inactive: bool,
    },

    /// Change fields of an existing product
    Edit {
        id: String,

        #[command(flatten)]
        fields: ProductFields,
    },

    /// Show a product in the public catalog
    Activate { id: String },

    /// Hide a product from the public catalog
    Deactivate { id: String },

    /// Delete a product
    Delete {
        id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// Submit a quote request
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// wedding, corporate, festival, private or other
        #[arg(long)]
        event_type: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        guests: Option<i64>,
        #[arg(long)]
        budget: Option<f64>,
        /// Product or kit of interest
        #[arg(long)]
        interest: Option<String>,
        #[arg(long, default_value = "")]
        message: String,
    },

    /// List quote requests, newest first
    List {
        /// Only requests in this status
        #[arg(long)]
        status: Option<String>,

        /// Maximum results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show a quote request
    Show { id: String },

    /// Move a quote request to a new status
    Status { id: String, status: String },
}

#[derive(Subcommand)]
enum StaffCommands {
    /// Add a staff member or change their role
    Add {
        email: String,

        /// viewer, editor or admin
        #[arg(long, default_value = "viewer")]
        role: String,
    },

    /// Remove a staff member
    Remove { email: String },

    /// List staff members
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create default config file
    Init,
    /// Show current config (secrets redacted)
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;

    // Config commands don't need the database
    if let Commands::Config(ref cmd) = cli.command {
        return run_config(cmd);
    }

    let db_path = match cli.db {
        Some(p) => p,
        None => Database::default_db_path()?,
    };
    let db = Database::open(&db_path)?;

    let session_path = Session::default_path()?;
    let mut session = Session::load(&session_path)?;
    let before = session.clone();
    session.refresh(&db)?;
    if session != before {
        session.save(&session_path)?;
    }

    match cli.command {
        Commands::List {
            search,
            category,
            effect,
            sort_price,
            sort_duration,
            all,
            limit,
        } => {
            let products = db.list_products()?;
            let state = FilterState {
                search: search.unwrap_or_default(),
                category,
                effect,
                price_sort: SortDirection::parse(&sort_price),
                duration_sort: SortDirection::parse(&sort_duration),
                active_only: !all,
            };
            let mut result = catalog::derive(&products, &state);
            if let Some(limit) = limit {
                result.truncate(limit);
            }
            if json_output {
                json_out::print_json(&result)?;
            } else {
                table::print_product_list(&result);
            }
        }

        Commands::Browse { all } => {
            let config = FireshowConfig::load()?;
            browse(db.list_products()?, config.debounce(), !all)?;
        }

        Commands::Show { id } => {
            let p = db
                .get_product(&id)?
                .with_context(|| format!("Product not found: {id}"))?;
            if json_output {
                json_out::print_json(&p)?;
            } else {
                table::print_product_detail(&p);
            }
        }

        Commands::Import {
            paths,
            format,
            dry_run,
        } => {
            session.require(Role::Editor)?;
            if paths.is_empty() {
                bail!("No paths provided.");
            }
            let format_enum = format
                .as_deref()
                .map(|f| {
                    ingest::Format::parse(f)
                        .with_context(|| format!("Unknown format: {f}. Use: json, yaml"))
                })
                .transpose()?;

            let report = ingest::import_paths(&db, &paths, format_enum, dry_run)?;
            let action = if dry_run { "Would import" } else { "Imported" };
            println!(
                "{action} {} product{} ({} new, {} updated)",
                report.total(),
                if report.total() == 1 { "" } else { "s" },
                report.inserted,
                report.updated
            );
        }

        Commands::Product(cmd) => {
            session.require(Role::Editor)?;
            run_product(&db, cmd, json_output)?;
        }

        Commands::Quote(cmd) => run_quote(&db, &session, cmd, json_output)?,

        Commands::Staff(cmd) => {
            // Open until the first staff member exists
            if db.staff_count()? > 0 {
                session.require(Role::Admin)?;
            }
            match cmd {
                StaffCommands::Add { email, role } => {
                    let role = Role::parse(&role)
                        .with_context(|| format!("Unknown role: {role}. Use: viewer, editor, admin"))?;
                    db.upsert_staff(&email, role)?;
                    println!("{} is now {}", email.trim(), role);
                }
                StaffCommands::Remove { email } => {
                    if !db.remove_staff(&email)? {
                        bail!("Not a staff member: {email}");
                    }
                    println!("Removed: {}", email.trim());
                }
                StaffCommands::List => {
                    let staff = db.list_staff()?;
                    if json_output {
                        json_out::print_json(&staff)?;
                    } else {
                        table::print_staff_list(&staff);
                    }
                }
            }
        }

        Commands::Login { email } => {
            let user = sign_in(&db, &mut session, &email)?.clone();
            session.save(&session_path)?;
            println!("Signed in as {} ({})", user.email, user.role);
        }

        Commands::Logout => {
            if session.user().is_none() {
                println!("Not signed in.");
            } else {
                session.apply(SessionEvent::SignedOut);
                session.save(&session_path)?;
                println!("Signed out.");
            }
        }

        Commands::Whoami => {
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "user": session.user(),
                    "signed_in_at": session.signed_in_at(),
                }))?;
            } else {
                match session.user() {
                    Some(u) => println!(
                        "{} ({}) since {}",
                        u.email,
                        u.role,
                        session.signed_in_at().unwrap_or("?")
                    ),
                    None => println!("Not signed in."),
                }
            }
        }

        Commands::Sync { api_key, dry_run } => {
            session.require(Role::Admin)?;
            let config = FireshowConfig::load()?;
            let backend = config.backend.as_ref();
            let key = config::resolve_credential(api_key.as_deref(), config::API_KEY_ENV, backend)?;
            let source = sync::build_source(backend, key)?;
            let report = sync::run_sync(source.as_ref(), &db, &SyncOptions { dry_run })?;
            if json_output {
                json_out::print_json(&report)?;
            } else {
                let prefix = if dry_run { "[dry-run] " } else { "" };
                println!(
                    "{prefix}{} remote products: {} new, {} updated, {} removed, {} failed ({:.1}s)",
                    report.remote_total,
                    report.inserted,
                    report.updated,
                    report.deleted,
                    report.failed,
                    report.duration_secs
                );
            }
        }

        Commands::Stats => {
            let stats = db.stats()?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                table::print_stats(&stats);
                if let Some(at) = sync::last_sync_at(&db, "backend")? {
                    println!("\n  Last sync:      {at}");
                }
            }
        }

        Commands::Config(cmd) => run_config(&cmd)?,
    }

    Ok(())
}

fn run_config(cmd: &ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init => {
            let path = config::config_path()?;
            if config::init_config()? {
                println!("Created config at: {}", path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
        ConfigCommands::Show => {
            let path = config::config_path()?;
            println!("Config: {}\n", path.display());
            let config = FireshowConfig::load()?;
            println!("{}", config.display_redacted());
        }
    }
    Ok(())
}

fn run_product(db: &Database, cmd: ProductCommands, json_output: bool) -> Result<()> {
    match cmd {
        ProductCommands::Add {
            id,
            fields,
            inactive,
        } => {
            let raw = RawProduct {
                id: id.map(serde_json::Value::String),
                name: fields.name,
                code: fields.code,
                manufacturer: fields.manufacturer,
                category: fields.category,
                effect: fields.effect,
                price: fields.price,
                duration_seconds: fields.duration,
                active: Some(!inactive),
                description: fields.description,
                image_url: fields.image_url,
            };
            let product = raw.into_new_product()?;
            if db.product_exists(&product.id)? {
                bail!("Product already exists: {} (use `product edit`)", product.id);
            }
            db.upsert_product(&product)?;
            print_saved(db, &product.id, "Added", json_output)?;
        }

        ProductCommands::Edit { id, fields } => {
            let current = db
                .get_product(&id)?
                .with_context(|| format!("Product not found: {id}"))?;
            let updated = apply_fields(NewProduct::from(&current), fields)?;
            db.upsert_product(&updated)?;
            print_saved(db, &id, "Updated", json_output)?;
        }

        ProductCommands::Activate { id } => {
            if !db.set_product_active(&id, true)? {
                bail!("Product not found: {id}");
            }
            println!("Activated: {id}");
        }

        ProductCommands::Deactivate { id } => {
            if !db.set_product_active(&id, false)? {
                bail!("Product not found: {id}");
            }
            println!("Deactivated: {id}");
        }

        ProductCommands::Delete { id, force } => {
            let p = db
                .get_product(&id)?
                .with_context(|| format!("Product not found: {id}"))?;

            if !force {
                eprint!("Delete \"{}\" ({})? [y/N] ", p.name, id);
                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if !answer.trim().eq_ignore_ascii_case("y") {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            db.delete_product(&id)?;
            println!("Deleted: {} ({})", p.name, id);
        }
    }
    Ok(())
}

/// Overlay the flags that were given onto `p`. Empty strings clear optional fields.
fn apply_fields(mut p: NewProduct, f: ProductFields) -> Result<NewProduct> {
    fn opt(v: String) -> Option<String> {
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    }

    if let Some(name) = f.name.and_then(opt) {
        p.name = name;
    }
    if let Some(category) = f.category.and_then(opt) {
        p.category = category;
    }
    if let Some(code) = f.code {
        p.code = opt(code);
    }
    if let Some(m) = f.manufacturer {
        p.manufacturer = opt(m);
    }
    if let Some(effect) = f.effect {
        p.effect = opt(effect);
    }
    if let Some(price) = f.price {
        if price < 0.0 {
            bail!("Price cannot be negative: {price}");
        }
        p.price = price;
    }
    if let Some(d) = f.duration {
        p.duration_seconds = (d >= 0.0).then_some(d);
    }
    if let Some(desc) = f.description {
        p.description = desc.trim().to_string();
    }
    if let Some(url) = f.image_url {
        p.image_url = opt(url);
    }
    Ok(p)
}

fn print_saved(db: &Database, id: &str, action: &str, json_output: bool) -> Result<()> {
    let p = db
        .get_product(id)?
        .with_context(|| format!("Product not found after save: {id}"))?;
    if json_output {
        json_out::print_json(&p)?;
    } else {
        println!("{action}: {} ({})", p.name, p.id);
    }
    Ok(())
}

fn run_quote(db: &Database, session: &Session, cmd: QuoteCommands, json_output: bool) -> Result<()> {
    match cmd {
        QuoteCommands::Submit {
            name,
            email,
            phone,
            date,
            event_type,
            location,
            guests,
            budget,
            interest,
            message,
        } => {
            let form = QuoteForm {
                name,
                email,
                phone,
                event_date: date,
                event_type,
                location,
                guest_count: guests,
                budget,
                interest,
                message,
            };
            let today = chrono::Local::now().date_naive();
            let request = form.validate(today)?;
            db.insert_quote(&request)?;
            if json_output {
                let stored = db.get_quote(&request.id)?;
                json_out::print_json(&stored)?;
            } else {
                println!("Thanks, {}! We'll be in touch about your {} on {}.", request.name, request.event_type, request.event_date);
                println!("  reference: {}", request.id);
            }
        }

        QuoteCommands::List { status, limit } => {
            session.require(Role::Editor)?;
            let status = status
                .as_deref()
                .map(|s| QuoteStatus::parse(s).with_context(|| format!("Unknown status: {s}")))
                .transpose()?;
            let quotes = db.list_quotes(status, limit)?;
            if json_output {
                json_out::print_json(&quotes)?;
            } else {
                table::print_quote_list(&quotes);
            }
        }

        QuoteCommands::Show { id } => {
            session.require(Role::Editor)?;
            let q = db
                .get_quote(&id)?
                .with_context(|| format!("Quote request not found: {id}"))?;
            if json_output {
                json_out::print_json(&q)?;
            } else {
                table::print_quote_detail(&q);
            }
        }

        QuoteCommands::Status { id, status } => {
            session.require(Role::Editor)?;
            let next = QuoteStatus::parse(&status).with_context(|| {
                format!("Unknown status: {status}. Use: new, contacted, quoted, confirmed, cancelled")
            })?;
            let q = db.update_quote_status(&id, next)?;
            if json_output {
                json_out::print_json(&q)?;
            } else {
                println!("{} ({}) is now {}", q.name, q.id, q.status);
            }
        }
    }
    Ok(())
}

enum BrowseStep {
    Render,
    Wait,
    Quit,
}

const BROWSE_HELP: &str = "Type to search. Commands:
  :category <name|all>   :effect <name|all>
  :price asc|desc|none   :duration asc|desc|none
  :active on|off         :categories   :effects
  :reset                 :quit";

/// Line-driven catalog browser. Input is read on a helper thread; the main
/// loop waits for the next line or the search deadline, whichever is first.
fn browse(products: Vec<Product>, delay: Duration, active_only: bool) -> Result<()> {
    let mut view = CatalogView::new(products, delay);
    view.set_active_only(active_only);

    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    eprintln!("{BROWSE_HELP}\n");
    render(&mut view);

    loop {
        let line = match view.next_deadline() {
            Some(deadline) => match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    // Input ended with a term still pending; let it settle once.
                    if let Some(d) = view.next_deadline() {
                        std::thread::sleep(d.saturating_duration_since(Instant::now()));
                    }
                    if view.poll() {
                        render(&mut view);
                    }
                    break;
                }
            },
            None => match rx.recv() {
                Ok(line) => Some(line),
                Err(_) => break,
            },
        };

        let step = match line {
            None => {
                if view.poll() {
                    BrowseStep::Render
                } else {
                    BrowseStep::Wait
                }
            }
            Some(line) => browse_input(&mut view, &line),
        };
        match step {
            BrowseStep::Render => render(&mut view),
            BrowseStep::Wait => {}
            BrowseStep::Quit => break,
        }
    }

    view.dispose();
    Ok(())
}

fn browse_input(view: &mut CatalogView<Product>, line: &str) -> BrowseStep {
    let Some(cmd) = line.trim_start().strip_prefix(':') else {
        view.set_search(line);
        return if view.is_searching() {
            BrowseStep::Wait
        } else {
            BrowseStep::Render
        };
    };

    let (name, arg) = match cmd.trim().split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (cmd.trim(), ""),
    };
    let arg_or_all = if arg.is_empty() { ALL } else { arg };

    match name {
        "q" | "quit" | "exit" => return BrowseStep::Quit,
        "category" | "c" => view.set_category(arg_or_all),
        "effect" | "e" => view.set_effect(arg_or_all),
        "price" | "p" => view.set_price_sort(SortDirection::parse(arg)),
        "duration" | "d" => view.set_duration_sort(SortDirection::parse(arg)),
        "active" => match arg {
            "on" | "yes" | "true" => view.set_active_only(true),
            "off" | "no" | "false" => view.set_active_only(false),
            _ => {
                eprintln!("usage: :active on|off");
                return BrowseStep::Wait;
            }
        },
        "reset" => view.reset_filters(),
        "categories" => {
            println!("{}", categories(view.items()).join(", "));
            return BrowseStep::Wait;
        }
        "effects" => {
            println!("{}", effects(view.items()).join(", "));
            return BrowseStep::Wait;
        }
        "help" | "h" | "?" => {
            eprintln!("{BROWSE_HELP}");
            return BrowseStep::Wait;
        }
        other => {
            eprintln!("unknown command :{other} (try :help)");
            return BrowseStep::Wait;
        }
    }
    BrowseStep::Render
}

fn render(view: &mut CatalogView<Product>) {
    let result = view.result();
    let state = view.filter_state();
    let term = view.settled_term();
    println!();
    if !term.trim().is_empty() {
        println!("search: \"{term}\"");
    }
    println!(
        "category: {}  effect: {}  price: {}  duration: {}  {}",
        state.category,
        state.effect,
        state.price_sort,
        state.duration_sort,
        if state.active_only { "active only" } else { "all products" }
    );
    table::print_product_list(&result);
    debug!(runs = ?view.stage_runs(), "rendered catalog");
}
