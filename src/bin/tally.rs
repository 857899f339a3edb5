use std::{fs::OpenOptions, process::ExitCode, sync::Arc, time::Duration};

use clap::{ArgAction, Parser, Subcommand, builder::BoolishValueParser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use tally_rs::{
    AmountBound, AppConfig, BulkOperation, BulkOperationKind, DEFAULT_STATE_DB, Error,
    HttpTransactionsApi, LabelUpdate, PaginationConfig, PaginationIndicator, QueryStateHandle,
    QueryStateStore, SortColumn, SqliteStorage, StatusField, TagId, TransactionId,
    TransactionType, TransactionsSession, VisibilityPreference, currency, format_date,
    is_eligible,
};

/// Browse and edit transactions on a Tally server.
///
/// Filters, sort order, visibility preferences and the bulk selection are
/// kept in a local state file between runs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the Transactions API.
    #[arg(long, env = "TALLY_API_URL", default_value = "http://localhost:8080/api")]
    api_url: String,

    /// Bearer token for the Transactions API.
    #[arg(long, env = "TALLY_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// File path to the SQLite database the list state is kept in.
    #[arg(long, env = "TALLY_STATE_DB", default_value = DEFAULT_STATE_DB)]
    state_db: String,

    /// Query string to open the list with, e.g. "type=BUSINESS&month=03".
    #[arg(long)]
    query: Option<String>,

    /// The page to load before editing rows.
    #[arg(long, global = true, default_value_t = 1)]
    page: u64,

    /// Transactions per page.
    #[arg(long, default_value_t = 20)]
    page_size: u64,

    /// Seconds to wait for the Transactions API.
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Milliseconds search input must be stable before it is applied in
    /// interactive mode.
    #[arg(long, default_value_t = 300)]
    search_debounce_ms: u64,

    /// File to write the debug log to.
    #[arg(long, default_value = "debug.log")]
    log_file: String,

    /// Print informational logs to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a page of transactions.
    List {
        /// The page to show.
        page: Option<u64>,
    },
    /// Search labels. In interactive mode the search is applied once typing
    /// stops.
    Search {
        /// The text to search for, empty to stop searching.
        text: Vec<String>,
    },
    /// Change the amount, month and type filters.
    Filter {
        /// Lowest amount to show, "" to remove.
        #[arg(long)]
        min: Option<String>,
        /// Highest amount to show, "" to remove.
        #[arg(long)]
        max: Option<String>,
        /// Month number to show, "" to remove.
        #[arg(long)]
        month: Option<String>,
        /// Show only business or personal transactions, picking the current
        /// type again shows both.
        #[arg(long = "type")]
        transaction_type: Option<TransactionType>,
        /// Clear every filter and the type first.
        #[arg(long)]
        reset: bool,
    },
    /// Toggle whether hidden, locked, flagged or split transactions are shown.
    Show {
        /// One of hidden, locked, flagged or split.
        #[arg(required_unless_present = "none")]
        preference: Option<VisibilityPreference>,
        /// Hide all four kinds.
        #[arg(long, conflicts_with = "preference")]
        none: bool,
    },
    /// Sort by date, label or amount. Sorting by the current column flips the
    /// direction.
    Sort { column: SortColumn },
    /// Select rows and apply one update to all of them.
    #[command(subcommand)]
    Bulk(BulkCommand),
    /// Give a transaction a custom label.
    Label {
        id: TransactionId,
        #[arg(required = true)]
        label: Vec<String>,
        /// Also relabel every transaction with the same bank label.
        #[arg(long)]
        all: bool,
        /// Also label future imports with the same bank label.
        #[arg(long)]
        future: bool,
    },
    /// Flip one of flag, lock, hidden or split on a transaction.
    Toggle { id: TransactionId, field: StatusField },
    /// Mark a transaction as business, or as personal with --personal.
    Business {
        id: TransactionId,
        #[arg(long)]
        personal: bool,
    },
    /// Assign a tag to a transaction.
    Tag { id: TransactionId, tag_id: TagId },
    /// Print the change log of a transaction.
    History { id: TransactionId },
    /// List the tags.
    Tags {
        /// Only tags for business or personal transactions.
        #[arg(long = "type")]
        tag_type: Option<TransactionType>,
    },
    /// Print the list state and its query string.
    State {
        /// Forget the stored state.
        #[arg(long)]
        clear: bool,
    },
    /// Read commands from stdin until "quit".
    Interactive,
}

#[derive(Subcommand, Debug)]
enum BulkCommand {
    /// Pick rows for a kind of update, picking the current kind again leaves
    /// bulk mode.
    Target { kind: BulkOperationKind },
    /// Select or deselect rows on the page.
    Select {
        #[arg(required = true)]
        ids: Vec<TransactionId>,
    },
    /// Select every eligible row on the page.
    All,
    /// Leave bulk mode.
    Clear,
    /// Set the new label for a label update.
    Label {
        #[arg(required = true)]
        label: Vec<String>,
    },
    /// Apply the update to the selected rows.
    #[command(subcommand)]
    Apply(BulkApply),
}

#[derive(Subcommand, Debug)]
enum BulkApply {
    Business,
    Personal,
    /// Use the label set with "bulk label".
    Label,
    Tag {
        tag_id: TagId,
    },
    Category {
        #[arg(required = true)]
        category: Vec<String>,
    },
    Status {
        field: StatusField,
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        value: bool,
    },
}

/// A command read in interactive mode.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&args.log_file, args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(log_file: &str, verbose: bool) {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(if verbose {
            LevelFilter::INFO
        } else {
            LevelFilter::WARN
        });

    let debug_log = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
                ),
        ),
        Err(error) => {
            eprintln!("could not open log file {log_file}: {error}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();
}

async fn run(args: Args) -> Result<ExitCode, Error> {
    let config = AppConfig {
        api_url: args.api_url,
        api_token: args.api_token,
        state_db: args.state_db,
        request_timeout: Duration::from_secs(args.timeout),
        search_debounce: Duration::from_millis(args.search_debounce_ms),
        pagination: PaginationConfig {
            default_page_size: args.page_size,
            ..PaginationConfig::default()
        },
        ..AppConfig::default()
    };

    let handle = QueryStateHandle::load(QueryStateStore::new(SqliteStorage::open(
        &config.state_db,
    )?));
    let api = Arc::new(HttpTransactionsApi::new(&config)?);
    let mut session = TransactionsSession::open(handle, api, &config, args.query.as_deref());

    match args.command {
        Command::Interactive => {
            interactive(&mut session).await;
            Ok(ExitCode::SUCCESS)
        }
        command => {
            if needs_rows(&command) {
                session.load_page(args.page).await;
            }
            execute(&mut session, command, false).await?;

            Ok(match session.error() {
                Some(_) => ExitCode::FAILURE,
                None => ExitCode::SUCCESS,
            })
        }
    }
}

/// Whether `command` works on the rows of the current page.
fn needs_rows(command: &Command) -> bool {
    match command {
        Command::Bulk(BulkCommand::Clear | BulkCommand::Label { .. } | BulkCommand::Apply(_)) => {
            false
        }
        Command::Bulk(_)
        | Command::Label { .. }
        | Command::Toggle { .. }
        | Command::Business { .. } => true,
        _ => false,
    }
}

async fn execute(
    session: &mut TransactionsSession,
    command: Command,
    interactive: bool,
) -> Result<(), Error> {
    match command {
        Command::List { page } => match (page, interactive) {
            (Some(page), true) => {
                if session.go_to_page(page).await.is_none() {
                    println!("There is no page {page}");
                }
            }
            (Some(page), false) => {
                session.load_page(page).await;
            }
            (None, _) => {
                session.refresh().await;
            }
        },
        Command::Search { text } => {
            let text = text.join(" ");
            if interactive {
                session.type_search(&text);
                return Ok(());
            }
            session
                .edit_filters(|panel, handle| panel.apply_search(handle, &text))
                .await?;
        }
        Command::Filter {
            min,
            max,
            month,
            transaction_type,
            reset,
        } => {
            session
                .edit_filters(|panel, handle| {
                    if reset {
                        panel.reset(handle)?;
                    }
                    match (min, max) {
                        (Some(min), Some(max)) => panel.set_amount_range(handle, &min, &max)?,
                        (Some(min), None) => panel.set_amount(handle, AmountBound::Min, &min)?,
                        (None, Some(max)) => panel.set_amount(handle, AmountBound::Max, &max)?,
                        (None, None) => {}
                    }
                    if let Some(month) = month {
                        panel.set_month(handle, &month)?;
                    }
                    if let Some(transaction_type) = transaction_type {
                        panel.toggle_type(handle, transaction_type)?;
                    }
                    Ok(())
                })
                .await?;
        }
        Command::Show { preference, none } => {
            session
                .edit_filters(|panel, handle| match preference {
                    Some(preference) if !none => panel.toggle_visibility(handle, preference),
                    _ => panel.clear_visibility(handle),
                })
                .await?;
        }
        Command::Sort { column } => {
            session
                .edit_filters(|panel, handle| panel.sort_by(handle, column))
                .await?;
        }
        Command::Bulk(command) => execute_bulk(session, command).await?,
        Command::Label {
            id,
            label,
            all,
            future,
        } => {
            let update = LabelUpdate::single(&label.join(" "))
                .replace_all(all)
                .for_future(future);
            session.relabel(id, update).await?
        }
        Command::Toggle { id, field } => session.toggle_status(id, field).await?,
        Command::Business { id, personal } => session.set_business(id, !personal).await?,
        Command::Tag { id, tag_id } => session.assign_tag(id, tag_id).await?,
        Command::History { id } => {
            let logs = session.history(id).await?;
            println!("{} changes to transaction {id}", session.log_count(id).await);
            for log in logs {
                println!(
                    "{:<24}  {:<8}  {:<6}  {} -> {}",
                    log.timestamp,
                    log.field_name,
                    log.method.to_string(),
                    log.old_value.as_deref().unwrap_or("-"),
                    log.new_value.as_deref().unwrap_or("-"),
                );
            }
            return Ok(());
        }
        Command::Tags { tag_type } => {
            for tag in session.tags(tag_type).await? {
                println!("{:>6}  {:<10}  {}", tag.id, tag.tag_type.as_query_value(), tag.name);
            }
            return Ok(());
        }
        Command::State { clear } => {
            if clear {
                session.handle().reset_to_default();
            }
            println!("?{}", session.query_string());
            println!("{}", serde_json::to_string_pretty(&session.state())?);
            return Ok(());
        }
        Command::Interactive => {
            println!("Already in interactive mode");
            return Ok(());
        }
    }

    render(session);
    Ok(())
}

async fn execute_bulk(session: &mut TransactionsSession, command: BulkCommand) -> Result<(), Error> {
    match command {
        BulkCommand::Target { kind } => session.change_bulk_target(kind)?,
        BulkCommand::Select { ids } => {
            for id in ids {
                session.toggle_row(id)?;
            }
        }
        BulkCommand::All => session.select_all_eligible()?,
        BulkCommand::Clear => session.clear_selection()?,
        BulkCommand::Label { label } => session.set_bulk_label(&label.join(" "))?,
        BulkCommand::Apply(apply) => {
            let response = match apply {
                BulkApply::Label => session.apply_bulk_label().await?,
                BulkApply::Business => session.apply_bulk(&BulkOperation::Business).await?,
                BulkApply::Personal => session.apply_bulk(&BulkOperation::Personal).await?,
                BulkApply::Tag { tag_id } => {
                    session.apply_bulk(&BulkOperation::Tag { tag_id }).await?
                }
                BulkApply::Category { category } => {
                    session
                        .apply_bulk(&BulkOperation::Category {
                            category: category.join(" "),
                        })
                        .await?
                }
                BulkApply::Status { field, value } => {
                    session
                        .apply_bulk(&BulkOperation::Status { field, value })
                        .await?
                }
            };
            println!("Updated {} transactions", response.updated_count);
        }
    }

    Ok(())
}

/// Read commands from stdin, applying search input once it settles and
/// refetching whenever the list state changes.
async fn interactive(session: &mut TransactionsSession) {
    let mut changes = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    session.sync().await;
    render(session);
    println!("Type \"help\" for commands or \"quit\" to exit.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(error) => {
                        tracing::error!("could not read stdin: {error}");
                        break;
                    }
                };

                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    [] => continue,
                    ["quit" | "exit" | "q"] => break,
                    _ => {}
                }

                match Line::try_parse_from(words) {
                    Ok(Line { command }) => {
                        if let Err(error) = execute(session, command, true).await {
                            eprintln!("error: {error}");
                        }
                    }
                    Err(error) => {
                        let _ = error.print();
                    }
                }
            }
            search = session.settled_search() => {
                match session
                    .edit_filters(|panel, handle| panel.apply_search(handle, &search))
                    .await
                {
                    Ok(()) => render(session),
                    Err(error) => eprintln!("error: {error}"),
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                if session.sync().await.is_some() {
                    render(session);
                }
            }
        }
    }
}

fn render(session: &TransactionsSession) {
    let state = session.state();
    let list = session.list();
    let selection = &state.bulk_selection;

    println!();
    println!("?{}", session.query_string());
    if let Some(target) = selection.target_type {
        print!("Bulk {target}: {} selected", selection.selected_ids.len());
        match &selection.label {
            Some(label) => println!(", new label \"{label}\""),
            None => println!(),
        }
    }

    if list.rows.is_empty() {
        println!("No transactions");
    }

    for row in &list.rows {
        let marker = match selection.target_type {
            None => "",
            Some(_) if selection.selected_ids.contains(&row.id) => "[x] ",
            Some(target) if is_eligible(row, Some(target)) => "[ ] ",
            Some(_) => " -  ",
        };
        let tag = row.tag.as_ref().map(|tag| tag.name.as_str()).unwrap_or("");

        println!(
            "{marker}{:>6}  {}  {:<40.40}  {:>12}  {} {}  {}",
            row.id,
            format_date(row.date),
            row.display_label(),
            currency(row.amount),
            row.transaction_type(),
            status_flags(row),
            tag,
        );
    }

    let pagination = session.pagination();
    println!(
        "Page {} of {}, {} transactions, {} hidden on this page",
        pagination.page(),
        pagination.total_pages(),
        pagination.total_records(),
        list.hidden_by_preferences,
    );
    if pagination.total_pages() > 1 {
        println!("{}", render_indicators(&session.page_indicators()));
    }

    if let Some(error) = session.error() {
        eprintln!("error: {error}");
    }
}

fn status_flags(row: &tally_rs::Transaction) -> String {
    [
        (StatusField::Flag, 'F'),
        (StatusField::Lock, 'L'),
        (StatusField::Hidden, 'H'),
        (StatusField::Split, 'S'),
    ]
    .into_iter()
    .map(|(field, letter)| if row.status(field) { letter } else { '.' })
    .collect()
}

fn render_indicators(indicators: &[PaginationIndicator]) -> String {
    indicators
        .iter()
        .map(|indicator| match indicator {
            PaginationIndicator::BackButton(_) => "<".to_owned(),
            PaginationIndicator::NextButton(_) => ">".to_owned(),
            PaginationIndicator::Page(page) => page.to_string(),
            PaginationIndicator::CurrPage(page) => format!("[{page}]"),
            PaginationIndicator::Ellipsis => "...".to_owned(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
