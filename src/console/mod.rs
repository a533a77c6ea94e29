//! Interactive front end: attach to a paused debuggee and save point clouds on demand.

use crate::action::{ActionProvider, CommandViewer, Document, PreviewAction, Viewer};
use crate::console::command::{Command, CommandError};
use crate::console::editor::{create_editor, ConsoleHelper};
use crate::console::help::{HELP, WELCOME_TEXT};
use crate::console::print::style::{ErrorView, FilePathView, KeywordView, WarnView};
use crate::console::print::ExternalPrinter;
use crate::dap::ClientEvent;
use crate::muted_error;
use crate::preview::{
    release_on_termination, Notifier, Position, PreviewOptions, Previewer, Range, Release,
    SessionStorage,
};
use crate::session::{DapSession, DebugSession};
use crate::weak_error;
use rustyline::error::ReadlineError;
use rustyline::history::MemHistory;
use rustyline::Editor;
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{mpsc, Arc, Once};
use std::thread;

pub mod command;
mod editor;
mod help;
pub mod print;

const PROMT: &str = "(plysnap) ";

type PSEditor = Editor<ConsoleHelper, MemHistory>;

/// Reports previewer messages on the terminal.
pub struct ConsoleNotifier {
    printer: ExternalPrinter,
}

impl ConsoleNotifier {
    pub fn new(printer: ExternalPrinter) -> Self {
        Self { printer }
    }

    pub fn printer(&self) -> &ExternalPrinter {
        &self.printer
    }
}

impl Notifier for ConsoleNotifier {
    fn warn(&self, message: &str) {
        self.printer.print(WarnView::from(message));
    }

    fn error(&self, message: &str) {
        self.printer.print(ErrorView::from(message));
    }

    fn missing_library(&self, module: &str, guidance: &str) {
        self.printer.print(ErrorView::from(format!(
            "python module `{module}` is not available in the debuggee"
        )));
        self.printer.print(format!("to install it: {guidance}"));
    }
}

enum Control {
    /// New command from user received
    Cmd(String),
    /// Terminate application
    Terminate,
}

pub struct AppBuilder {
    options: PreviewOptions,
    storage: Arc<SessionStorage>,
    viewer: Option<CommandViewer>,
}

impl AppBuilder {
    pub fn new(options: PreviewOptions, storage: Arc<SessionStorage>) -> Self {
        Self {
            options,
            storage,
            viewer: None,
        }
    }

    pub fn with_viewer(self, viewer: Option<CommandViewer>) -> Self {
        Self { viewer, ..self }
    }

    pub fn build(
        self,
        session: DapSession,
        events: Receiver<ClientEvent>,
    ) -> anyhow::Result<TerminalApplication> {
        let (control_tx, control_rx) = mpsc::sync_channel::<Control>(0);
        let mut editor = create_editor(PROMT)?;

        let notifier = ConsoleNotifier::new(ExternalPrinter::new(&mut editor));
        let previewer = Previewer::new(self.options, self.storage, notifier);

        Ok(TerminalApplication {
            session,
            events,
            previewer,
            viewer: self.viewer,
            editor,
            control_tx,
            control_rx,
        })
    }
}

pub struct TerminalApplication {
    session: DapSession,
    events: Receiver<ClientEvent>,
    previewer: Previewer<ConsoleNotifier>,
    viewer: Option<CommandViewer>,
    editor: PSEditor,
    control_tx: SyncSender<Control>,
    control_rx: Receiver<Control>,
}

static CTRL_C_ONCE: Once = Once::new();
static HELLO_ONCE: Once = Once::new();

impl TerminalApplication {
    pub fn run(mut self) -> anyhow::Result<()> {
        let session_id = self.session.id().to_string();
        let storage = Arc::clone(self.previewer.storage());

        {
            let storage = Arc::clone(&storage);
            let session_id = session_id.clone();
            CTRL_C_ONCE.call_once(|| {
                weak_error!(
                    ctrlc::set_handler(move || {
                        storage.release(&session_id);
                        std::process::exit(130);
                    }),
                    "ctrl-c handler:"
                );
            });
        }

        // watch the debug session, its end releases the artifacts
        {
            let printer = ExternalPrinter::new(&mut self.editor);
            let storage = Arc::clone(&storage);
            let session_id = session_id.clone();
            let control_tx = self.control_tx.clone();
            let events = self.events;
            thread::spawn(move || {
                let end = release_on_termination(&storage, &session_id, events, |ev| {
                    if ev.event == "stopped" {
                        printer.print(KeywordView::from("debuggee paused"));
                    }
                    log::debug!(target: "plysnap::dap", "event {}", ev.event);
                });

                match end.release {
                    Release::Removed => printer.print(format!("{}, artifacts removed", end.reason)),
                    Release::Failed => printer.print(WarnView::from(format!(
                        "{}, could not remove artifacts of session {session_id}",
                        end.reason
                    ))),
                    Release::Untracked => printer.print(end.reason),
                }
                _ = control_tx.send(Control::Terminate);
            });
        }

        let mut editor = self.editor;
        {
            let control_tx = self.control_tx.clone();
            thread::spawn(move || {
                HELLO_ONCE.call_once(|| {
                    println!("{WELCOME_TEXT}");
                });

                loop {
                    let line = editor.readline(PROMT);
                    match line {
                        Ok(input) => {
                            if Command::parse(&input) == Ok(Command::Quit) {
                                _ = control_tx.send(Control::Terminate);
                                break;
                            }
                            _ = editor.add_history_entry(&input);
                            if control_tx.send(Control::Cmd(input)).is_err() {
                                break;
                            }
                        }
                        Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                        Err(err) => {
                            println!("error: {:#}", err);
                            _ = control_tx.send(Control::Terminate);
                            break;
                        }
                    }
                }
            });
        }

        let app_loop = AppLoop {
            session: self.session,
            previewer: self.previewer,
            viewer: self.viewer,
            provider: ActionProvider,
            control_rx: self.control_rx,
        };
        app_loop.run();

        storage.release(&session_id);
        Ok(())
    }
}

struct AppLoop {
    session: DapSession,
    previewer: Previewer<ConsoleNotifier>,
    viewer: Option<CommandViewer>,
    provider: ActionProvider,
    control_rx: Receiver<Control>,
}

impl AppLoop {
    fn printer(&self) -> &ExternalPrinter {
        self.previewer.notifier().printer()
    }

    fn preview(&self, action: PreviewAction) {
        let viewer = self.viewer.as_ref().map(|v| v as &dyn Viewer);
        if let Some(path) = action.run(&self.previewer, &self.session, viewer) {
            self.printer()
                .print(format!("saved {}", FilePathView::from(path.display())));
        }
    }

    fn handle_command(&self, cmd: &str) -> anyhow::Result<()> {
        match Command::parse(cmd) {
            Err(CommandError::Empty) => {}
            Err(e) => return Err(e.into()),
            Ok(Command::Help) => self.printer().print(HELP),
            Ok(Command::Quit) => {}
            Ok(Command::At { file, line, column }) => {
                let document = Document::read(&file)?;
                let range = Range::caret(Position::new(line - 1, column - 1));
                match self.provider.provide(&document, range) {
                    Some(action) => {
                        self.printer().print(KeywordView::from(&action.title));
                        self.preview(action);
                    }
                    None => self.printer().print(format!(
                        "nothing to preview at {}:{line}:{column}",
                        FilePathView::from(file.display())
                    )),
                }
            }
            Ok(Command::Preview(expression)) => self.preview(PreviewAction {
                title: format!("Preview point cloud `{expression}`"),
                expression,
            }),
        }
        Ok(())
    }

    fn run(self) {
        while let Ok(control) = self.control_rx.recv() {
            match control {
                Control::Cmd(cmd) => {
                    if let Err(e) = self.handle_command(&cmd) {
                        self.printer().print(ErrorView::from(format!("error: {e:#}")));
                    }
                }
                Control::Terminate => break,
            }
        }

        muted_error!(self.session.disconnect(), "disconnect:");
    }
}
