use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::info;

use userdir::controller::Controller;
use userdir::domain::{
    DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE, DEFAULT_PORT, Message, ServerConfig, UDError, ViewerConfig,
};
use userdir::logging::{init_file_logging, init_stdout_logging};
use userdir::model::{Model, Status};
use userdir::server;
use userdir::source::{HttpSource, Loader};
use userdir::ui::TableUI;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the user fixture as JSON on /api/users
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// JSON file holding the user records
        #[arg(short, long, default_value = "data/users.json")]
        fixture: String,

        /// Allowed CORS origin, may be repeated
        #[arg(long = "origin")]
        origins: Vec<String>,
    },
    /// Browse the user directory in the terminal
    View {
        /// Users endpoint
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        url: String,

        /// Rows per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Log file, the terminal is used by the viewer
        #[arg(long, default_value = "userdir.log")]
        log_file: String,
    },
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> Result<PathBuf, UDError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| UDError::Config(format!("cannot expand {path:?}: {e}")))
}

fn run() -> Result<(), UDError> {
    let args = Args::parse();
    let runtime = Runtime::new()?;

    match args.command {
        Command::Serve {
            port,
            bind,
            fixture,
            origins,
        } => {
            init_stdout_logging()?;
            let mut config = ServerConfig::default()
                .with_port(port)
                .with_bind(bind)
                .with_fixture(expand_path(&fixture)?);
            if !origins.is_empty() {
                config = config.with_allowed_origins(origins);
            }
            runtime.block_on(server::serve(config))
        }
        Command::View {
            url,
            page_size,
            log_file,
        } => {
            let config = ViewerConfig::default()
                .with_endpoint(url)
                .with_page_size(page_size)
                .with_log_file(expand_path(&log_file)?);
            init_file_logging(&config.log_file)?;
            info!("Starting viewer on {}", config.endpoint);

            let source = Arc::new(HttpSource::new(config.endpoint.clone()));
            let mut loader = Loader::new(source, runtime.handle().clone());

            let mut terminal = ratatui::init();
            let result = view(&config, &mut loader, &mut terminal);
            ratatui::restore();
            result
        }
    }
}

fn view(
    config: &ViewerConfig,
    loader: &mut Loader,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), UDError> {
    let mut model = Model::init(config);
    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    while model.status != Status::Quitting {
        if model.take_fetch_request() {
            loader.trigger();
        }
        while let Some(result) = loader.try_recv() {
            model.update(Some(Message::Loaded(result)))?;
        }

        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }

    Ok(())
}
