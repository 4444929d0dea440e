pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use valence::{
    api::ApiClient,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    loader::{RetryPolicy, WordSource},
    logging,
    phase::Phase,
    runtime::{
        signal_for_key, CrosstermEventSource, EventSource, FixedTicker, Runner, SessionEvent,
        Ticker,
    },
    session::{Session, SessionConfig},
    submitter::ResultsSink,
    timer::{Clock, MonotonicClock},
};

const TICK_RATE_MS: u64 = 100;

/// terminal runtime for word-valence reaction-time experiments
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Presents a practice block and a scored block of words, times each directional response, and submits the scored trials to the results service."
)]
pub struct Cli {
    /// base URL of the word-list and results services
    #[clap(short = 'u', long, env = "VALENCE_BASE_URL")]
    base_url: Option<String>,

    /// submit practice-block trials together with the scored ones
    /// (`--include-practice=false` overrides a stored `true`)
    #[clap(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    include_practice: Option<bool>,

    /// pre-fill the participant email
    #[clap(short = 'e', long)]
    email: Option<String>,

    /// log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// read settings from this file instead of the default config location
    #[clap(long)]
    config: Option<PathBuf>,

    /// persist the effective settings to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Command-line values take precedence over the stored config.
    fn resolve(&self, stored: Config) -> Config {
        Config {
            base_url: self.base_url.clone().unwrap_or(stored.base_url),
            include_practice: self.include_practice.unwrap_or(stored.include_practice),
        }
    }

    fn config_store(&self) -> FileConfigStore {
        self.config
            .as_ref()
            .map(FileConfigStore::with_path)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<S, R, C: Clock = MonotonicClock> {
    pub session: Session<S, R, C>,
    pub identifier_input: String,
    pub base_url: String,
}

impl<S, R, C> App<S, R, C>
where
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
{
    pub fn new(session: Session<S, R, C>, identifier_input: String, base_url: String) -> Self {
        Self {
            session,
            identifier_input,
            base_url,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.controller().phase()
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return Flow::Quit;
        }

        match self.phase() {
            Phase::AwaitingIdentifier => match key.code {
                KeyCode::Enter => {
                    let _ = self.session.submit_identifier(&self.identifier_input);
                }
                KeyCode::Backspace => {
                    self.identifier_input.pop();
                }
                KeyCode::Char(c) => self.identifier_input.push(c),
                _ => {}
            },
            Phase::Completed => {
                if key.code == KeyCode::Char('q') || key.code == KeyCode::Enter {
                    return Flow::Quit;
                }
            }
            Phase::Scored if key.code == KeyCode::Char('r') => {
                if let Err(err) = self.session.resubmit() {
                    tracing::debug!(error = %err, "resubmit not available");
                }
            }
            _ => {
                if let Some(signal) = signal_for_key(&key) {
                    self.session.signal(signal);
                }
            }
        }
        Flow::Continue
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    logging::init_logging(cli.verbose, &AppDirs::log_path())?;

    let store = cli.config_store();
    let config = cli.resolve(store.load());
    if cli.save_config {
        store.save(&config)?;
        tracing::info!(path = %store.path().display(), "config saved");
    }
    tracing::info!(base_url = %config.base_url, include_practice = config.include_practice, "starting session");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let client = ApiClient::new(config.base_url.clone())?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let session = Session::new(
        SessionConfig {
            include_practice: config.include_practice,
            retry: RetryPolicy::default(),
            backup_dir: Some(AppDirs::backup_dir()),
        },
        client.clone(),
        client,
        MonotonicClock,
        rt.handle().clone(),
        runner.sender(),
    );
    let mut app = App::new(session, cli.email.clone().unwrap_or_default(), config.base_url);

    let result = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B, S, R, C, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, R, C>,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
    E: EventSource,
    T: Ticker,
{
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            SessionEvent::Key(key) => {
                if app.on_key(key) == Flow::Quit {
                    break;
                }
            }
            SessionEvent::Tick | SessionEvent::Resize => {}
            event => app.session.handle(event),
        }
    }

    if app.phase() != Phase::Completed {
        tracing::warn!(phase = %app.phase(), "session abandoned");
    }
    app.session.teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;
    use valence::{
        error::{LoadError, SubmitError},
        runtime::TestEventSource,
        stimulus::{Polarity, StimulusSet, WordStimulus},
        submitter::ResultsPayload,
        timer::ManualClock,
    };

    struct StaticWords;

    #[async_trait]
    impl WordSource for StaticWords {
        async fn fetch_words(&self) -> Result<StimulusSet, LoadError> {
            Ok(StimulusSet::new(
                vec![WordStimulus::new("sun", Polarity::Positive, "en")],
                vec![WordStimulus::new("grief", Polarity::Negative, "en")],
            ))
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl ResultsSink for AcceptAll {
        async fn send_results(&self, _payload: &ResultsPayload) -> Result<(), SubmitError> {
            Ok(())
        }
    }

    type TestApp = App<Arc<StaticWords>, Arc<AcceptAll>, ManualClock>;

    fn test_app(rt: &tokio::runtime::Runtime, runner: &Runner<TestEventSource, FixedTicker>) -> TestApp {
        let session = Session::new(
            SessionConfig::default(),
            Arc::new(StaticWords),
            Arc::new(AcceptAll),
            ManualClock::new(),
            rt.handle().clone(),
            runner.sender(),
        );
        App::new(session, String::new(), "http://localhost:5000".into())
    }

    fn test_runner() -> Runner<TestEventSource, FixedTicker> {
        Runner::new(TestEventSource::new(), FixedTicker::new(Duration::from_millis(5)))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(app: &mut TestApp, s: &str) {
        for c in s.chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
    }

    fn pump_until(app: &mut TestApp, runner: &Runner<TestEventSource, FixedTicker>, phase: Phase) {
        for _ in 0..400 {
            if app.phase() == phase {
                return;
            }
            app.session.handle(runner.step());
        }
        panic!("never reached {phase}, stuck in {}", app.phase());
    }

    struct NoWords;

    #[async_trait]
    impl WordSource for NoWords {
        async fn fetch_words(&self) -> Result<StimulusSet, LoadError> {
            Err(LoadError::Status(503))
        }
    }

    struct RejectAll;

    #[async_trait]
    impl ResultsSink for RejectAll {
        async fn send_results(&self, _payload: &ResultsPayload) -> Result<(), SubmitError> {
            Err(SubmitError::Rejected {
                status: 500,
                message: "database offline".into(),
            })
        }
    }

    fn render_any<S, R>(app: &App<S, R, ManualClock>) -> String
    where
        S: WordSource + 'static,
        R: ResultsSink + 'static,
    {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui::draw(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn rendered(app: &TestApp) -> String {
        render_any(app)
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["valence"]);
        assert_eq!(cli.include_practice, None);
        assert_eq!(cli.email, None);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.save_config);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "valence",
            "-u",
            "https://lab.example",
            "--include-practice",
            "-e",
            "p@lab.example",
            "-vv",
        ]);
        assert_eq!(cli.base_url.as_deref(), Some("https://lab.example"));
        assert_eq!(cli.include_practice, Some(true));
        assert_eq!(cli.email.as_deref(), Some("p@lab.example"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_overrides_stored_config() {
        let stored = Config {
            base_url: "http://stored.example".into(),
            include_practice: true,
        };

        let cli = Cli::parse_from(["valence", "--base-url", "http://cli.example"]);
        let resolved = cli.resolve(stored.clone());
        assert_eq!(resolved.base_url, "http://cli.example");
        assert!(resolved.include_practice);

        let cli = Cli::parse_from(["valence", "--include-practice=false"]);
        assert!(!cli.resolve(stored.clone()).include_practice);

        let cli = Cli::parse_from(["valence", "--include-practice"]);
        let off = Config {
            include_practice: false,
            ..stored.clone()
        };
        assert!(cli.resolve(off).include_practice);

        let cli = Cli::parse_from(["valence", "--config", "/tmp/x.json"]);
        assert_eq!(cli.config_store().path(), std::path::Path::new("/tmp/x.json"));
        if std::env::var_os("VALENCE_BASE_URL").is_none() {
            assert_eq!(cli.resolve(stored).base_url, "http://stored.example");
        }
    }

    #[test]
    fn test_identifier_entry_and_rejection() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let mut app = test_app(&rt, &runner);

        type_str(&mut app, "nobody");
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.phase(), Phase::AwaitingIdentifier);
        assert!(rendered(&app).contains("valid email"));

        app.on_key(key(KeyCode::Backspace));
        assert_eq!(app.identifier_input, "nobod");
    }

    #[test]
    fn test_integration_complete_session() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let mut app = test_app(&rt, &runner);

        type_str(&mut app, "p@lab.example");
        app.on_key(key(KeyCode::Enter));
        pump_until(&mut app, &runner, Phase::Intro);
        assert!(rendered(&app).contains("Space"));

        app.on_key(key(KeyCode::Char(' ')));
        assert_eq!(app.phase(), Phase::Instructions);
        app.on_key(key(KeyCode::Char(' ')));
        assert_eq!(app.phase(), Phase::Practice);
        let screen = rendered(&app);
        assert!(screen.contains("sun"));
        assert!(screen.contains("1/1"));

        app.on_key(key(KeyCode::Right));
        assert_eq!(app.phase(), Phase::PracticeComplete);
        app.on_key(key(KeyCode::Char(' ')));
        assert!(rendered(&app).contains("grief"));

        app.on_key(key(KeyCode::Left));
        pump_until(&mut app, &runner, Phase::Completed);
        assert!(rendered(&app).contains("Thank you"));
        assert_eq!(app.session.controller().recorder().len(), 2);
        assert_eq!(app.on_key(key(KeyCode::Char('q'))), Flow::Quit);
    }

    #[test]
    fn test_escape_quits_from_any_phase() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let mut app = test_app(&rt, &runner);

        assert_eq!(app.on_key(key(KeyCode::Esc)), Flow::Quit);
        assert_eq!(
            app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Flow::Quit
        );
        assert_eq!(app.identifier_input, "");
    }

    #[test]
    fn test_load_error_screen_offers_retry() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let config = SessionConfig {
            retry: RetryPolicy {
                max_retries: 0,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            ..SessionConfig::default()
        };
        let session = Session::new(
            config,
            NoWords,
            AcceptAll,
            ManualClock::new(),
            rt.handle().clone(),
            runner.sender(),
        );
        let mut app = App::new(session, "p@lab.example".into(), "http://localhost:5000".into());

        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.phase(), Phase::Loading);
        let screen = render_any(&app);
        assert!(screen.contains("Loading word list"));
        assert!(screen.contains("p@lab.example @ http://localhost:5000"));

        for _ in 0..400 {
            if app.phase() == Phase::LoadError {
                break;
            }
            app.session.handle(runner.step());
        }
        assert_eq!(app.phase(), Phase::LoadError);
        let screen = render_any(&app);
        assert!(screen.contains("could not be loaded"));
        assert!(screen.contains("to try again"));
    }

    #[test]
    fn test_failed_submission_screen_offers_resubmit() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let session = Session::new(
            SessionConfig::default(),
            StaticWords,
            RejectAll,
            ManualClock::new(),
            rt.handle().clone(),
            runner.sender(),
        );
        let mut app = App::new(session, "p@lab.example".into(), "http://localhost:5000".into());

        app.on_key(key(KeyCode::Enter));
        for _ in 0..400 {
            if app.phase() == Phase::Intro {
                break;
            }
            app.session.handle(runner.step());
        }
        for code in [
            KeyCode::Char(' '),
            KeyCode::Char(' '),
            KeyCode::Right,
            KeyCode::Char(' '),
            KeyCode::Left,
        ] {
            app.on_key(key(code));
        }
        for _ in 0..400 {
            if app.session.notice().is_some() {
                break;
            }
            app.session.handle(runner.step());
        }

        assert_eq!(app.phase(), Phase::Scored);
        let screen = render_any(&app);
        assert!(screen.contains("database offline"));
        assert!(screen.contains("(r) retry"));
    }

    #[test]
    fn test_run_app_exits_on_escape() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = test_runner();
        let mut app = test_app(&rt, &runner);
        runner.sender().send(SessionEvent::Key(key(KeyCode::Esc))).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        run_app(&mut terminal, &mut app, &runner).unwrap();
        assert_eq!(app.phase(), Phase::AwaitingIdentifier);
    }
}
