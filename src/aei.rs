//! Arimaa Engine Interface (AEI) implementation.
//!
//! AEI is a line-oriented text protocol between an Arimaa engine and a
//! controller (a game server, a GUI or a match runner). The controller
//! sends commands on stdin; the engine answers on stdout with `log`, `info`
//! and `bestmove` lines.
//!
//! ## Supported Commands
//!
//! - `aei` - Protocol handshake
//! - `isready` - Answer `readyok`
//! - `newgame` - Reset the game to an empty board
//! - `setposition <side> [<board>]` - Install a position
//! - `setoption name <X> value <Y>` - Change an option
//! - `makemove <move>` - Play a move for the side to move
//! - `go [ponder|infinite]` - Start searching
//! - `stop` - Stop searching and report the best move
//! - `quit` - Exit
//!
//! Extensions for interactive use: `newstandard`, `moves [n]`,
//! `step [step]`, `unstep`, `pass`, `unpass`, `unmove`, `hash`, `eval`,
//! `print [short|g|s|fg|fs|<piece>]`, `pv` and `movenow`.
//!
//! Errors are reported as `log ERROR: <message>` and never end the loop.
//!
//! ## Example
//!
//! ```ignore
//! use arimaa_zoo::aei::Aei;
//! use arimaa_zoo::settings::Settings;
//! let mut aei = Aei::new(Settings::default(), std::io::stdout(), false);
//! aei.run(std::io::stdin().lock()).unwrap();
//! ```

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::bitboard::Bitboard;
use crate::engine::{Engine, GoMode, SearchReport};
use crate::error::AeiError;
use crate::eval::step_score;
use crate::movegen::legal_steps;
use crate::piece::{Color, Piece};
use crate::position::Position;
use crate::settings::Settings;
use crate::square::Square;
use crate::step::{Move, Step};

/// AEI protocol version spoken.
const PROTOCOL_VERSION: &str = "1";

/// Shared output stream. Background searches write through it too.
pub type Output = Arc<Mutex<Box<dyn Write + Send>>>;

type Handler = fn(&mut Aei, &str) -> Result<(), AeiError>;

/// Write one protocol line.
fn send(out: &Output, log_traffic: bool, line: &str) -> std::io::Result<()> {
    if log_traffic {
        info!("> {line}");
    }
    let mut w = out.lock();
    writeln!(w, "{line}")?;
    w.flush()
}

/// Render a bitboard as a grid, rank 8 first.
fn grid(b: Bitboard) -> String {
    let mut s = String::new();
    for rank in (0..8).rev() {
        for file in 0..8 {
            let sq = Square::from_coords(file, rank);
            s.push(if b.contains(sq) { 'x' } else { '.' });
        }
        s.push('\n');
    }
    s
}

/// AEI front-end state.
pub struct Aei {
    engine: Engine,
    out: Output,
    commands: HashMap<&'static str, Handler>,
    log_traffic: bool,
}

impl Aei {
    /// A front-end writing to `writer`. With `log_traffic` every line read
    /// and written is also traced.
    pub fn new(settings: Settings, writer: impl Write + Send + 'static, log_traffic: bool) -> Self {
        let mut commands: HashMap<&'static str, Handler> = HashMap::new();
        commands.insert("aei", Aei::aei);
        commands.insert("isready", Aei::isready);
        commands.insert("newgame", Aei::newgame);
        commands.insert("setposition", Aei::setposition);
        commands.insert("setoption", Aei::setoption);
        commands.insert("makemove", Aei::makemove);
        commands.insert("go", Aei::go);
        commands.insert("stop", Aei::stop);
        commands.insert("quit", Aei::quit);
        commands.insert("newstandard", Aei::newstandard);
        commands.insert("new", Aei::newstandard);
        commands.insert("moves", Aei::moves);
        commands.insert("step", Aei::step);
        commands.insert("unstep", Aei::unstep);
        commands.insert("pass", Aei::pass);
        commands.insert("unpass", Aei::unpass);
        commands.insert("unmove", Aei::unmove);
        commands.insert("hash", Aei::hash);
        commands.insert("eval", Aei::eval);
        commands.insert("print", Aei::print);
        commands.insert("pv", Aei::pv);
        commands.insert("movenow", Aei::movenow);

        Aei {
            engine: Engine::new(settings),
            out: Arc::new(Mutex::new(Box::new(writer))),
            commands,
            log_traffic,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead) -> Result<(), AeiError> {
        for line in input.lines() {
            let line = line?;
            if self.log_traffic {
                info!("< {line}");
            }
            match self.execute(&line) {
                Ok(()) => {}
                Err(e) if e.is_quit() => break,
                Err(AeiError::Io(e)) => return Err(AeiError::Io(e)),
                Err(e) => self.write(&format!("log ERROR: {e}"))?,
            }
        }
        self.engine.stop();
        Ok(())
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str) -> Result<(), AeiError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let (command, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let handler = self
            .commands
            .get(command)
            .copied()
            .ok_or_else(|| AeiError::UnknownCommand(line.to_string()))?;
        handler(self, args.trim())
    }

    fn write(&self, line: &str) -> Result<(), AeiError> {
        send(&self.out, self.log_traffic, line).map_err(AeiError::from)
    }

    /// Write `text` as `log` lines.
    fn log(&self, text: &str) -> Result<(), AeiError> {
        for line in text.lines() {
            self.write(&format!("log {line}"))?;
        }
        Ok(())
    }

    // =========================================================================
    // Core Commands
    // =========================================================================

    fn aei(&mut self, _args: &str) -> Result<(), AeiError> {
        self.write(&format!("protocol-version {PROTOCOL_VERSION}"))?;
        self.write(&format!("id name {}", self.engine.settings().bot_name))?;
        let author = env!("CARGO_PKG_AUTHORS");
        if !author.is_empty() {
            self.write(&format!("id author {author}"))?;
        }
        self.write(&format!("id version {}", env!("CARGO_PKG_VERSION")))?;
        self.write("aeiok")
    }

    fn isready(&mut self, _args: &str) -> Result<(), AeiError> {
        self.write("readyok")
    }

    fn newgame(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.new_game();
        Ok(())
    }

    fn setposition(&mut self, args: &str) -> Result<(), AeiError> {
        let pos = Position::from_short(args)?;
        self.engine.set_position(pos);
        Ok(())
    }

    fn setoption(&mut self, args: &str) -> Result<(), AeiError> {
        self.engine.set_option(args)
    }

    fn makemove(&mut self, args: &str) -> Result<(), AeiError> {
        if args.is_empty() {
            return Err(AeiError::Usage("makemove needs a move".to_string()));
        }
        let mv: Move = args.parse()?;
        self.engine.make_move(&mv)?;
        Ok(())
    }

    fn go(&mut self, args: &str) -> Result<(), AeiError> {
        let mode = match args {
            "" => GoMode::Normal,
            "ponder" => GoMode::Ponder,
            "infinite" => GoMode::Infinite,
            other => return Err(AeiError::Usage(format!("unsupported go command: {other:?}"))),
        };
        let out = Arc::clone(&self.out);
        let log_traffic = self.log_traffic;
        self.engine.go(
            mode,
            Box::new(move |report: &SearchReport| {
                if let Err(e) = report_search(&out, log_traffic, report) {
                    warn!(error = %e, "failed to write search report");
                }
            }),
        )
    }

    fn stop(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.stop();
        Ok(())
    }

    fn quit(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.stop();
        Err(AeiError::Quit)
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    fn newstandard(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.new_game();
        self.engine.set_position(Position::standard());
        Ok(())
    }

    fn moves(&mut self, args: &str) -> Result<(), AeiError> {
        let limit = if args.is_empty() {
            0
        } else {
            args.parse()
                .map_err(|_| AeiError::Usage(format!("moves takes a count, got {args:?}")))?
        };
        let moves = self.engine.ordered_moves(limit);
        for (mv, score) in &moves {
            self.log(&format!("[{score}] {mv}"))?;
        }
        self.log(&moves.len().to_string())
    }

    fn step(&mut self, args: &str) -> Result<(), AeiError> {
        if args.is_empty() {
            let pos = self.engine.position();
            let lines: Vec<String> = legal_steps(pos)
                .iter()
                .map(|s| format!("[{}] {s}", step_score(pos, s)))
                .collect();
            for line in lines {
                self.log(&line)?;
            }
            return Ok(());
        }
        let step = Step::parse(args)?
            .ok_or_else(|| AeiError::Usage("captures are not steps".to_string()))?;
        self.engine.step(step)?;
        Ok(())
    }

    fn unstep(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.unstep()?;
        Ok(())
    }

    fn pass(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.pass()?;
        Ok(())
    }

    fn unpass(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.unpass()?;
        Ok(())
    }

    fn unmove(&mut self, _args: &str) -> Result<(), AeiError> {
        self.engine.unmove()?;
        Ok(())
    }

    fn hash(&mut self, _args: &str) -> Result<(), AeiError> {
        self.log(&self.engine.position().zhash().to_string())
    }

    fn eval(&mut self, _args: &str) -> Result<(), AeiError> {
        self.log(&format!("eval: {}", self.engine.eval()))
    }

    fn print(&mut self, args: &str) -> Result<(), AeiError> {
        let pos = self.engine.position();
        let board = pos.board();
        let frozen = |c: Color| {
            board
                .presence(c)
                .squares()
                .filter(|&sq| board.is_frozen(sq))
                .fold(Bitboard::default(), |b, sq| b | sq.bitboard())
        };
        let text = match args {
            "" => pos.to_string(),
            "short" => pos.to_short(),
            "g" => grid(board.presence(Color::Gold)),
            "s" => grid(board.presence(Color::Silver)),
            "fg" => grid(frozen(Color::Gold)),
            "fs" => grid(frozen(Color::Silver)),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => grid(board.bitboard(Piece::from_char(c)?)),
                    _ => return Err(AeiError::Usage(format!("cannot print {other:?}"))),
                }
            }
        };
        self.log(&text)
    }

    fn pv(&mut self, _args: &str) -> Result<(), AeiError> {
        match self.engine.last_report() {
            Some(r) if !r.notation.is_empty() => {
                self.log(&format!("[{}] {}", r.score(), r.notation))
            }
            _ => Ok(()),
        }
    }

    fn movenow(&mut self, _args: &str) -> Result<(), AeiError> {
        let report = self.engine.search();
        match report.best {
            Some(mv) => {
                self.engine.make_move(&mv)?;
                self.log(&format!("played {}", report.notation))
            }
            None => self.log("no best move found"),
        }
    }
}

/// Write the `info` lines of a finished search and, unless pondering, its
/// `bestmove`.
fn report_search(out: &Output, log_traffic: bool, report: &SearchReport) -> std::io::Result<()> {
    for line in report.info_lines() {
        send(out, log_traffic, &line)?;
    }
    if !report.wants_bestmove() {
        return Ok(());
    }
    if report.notation.is_empty() {
        send(out, log_traffic, "log ERROR: no legal move")
    } else {
        send(out, log_traffic, &format!("bestmove {}", report.notation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writer whose contents the test can read back.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn aei() -> (Aei, SharedBuf) {
        let buf = SharedBuf::default();
        let settings = Settings {
            playouts: 50,
            hash_mb: 1,
            seed: 3,
            ..Settings::default()
        };
        (Aei::new(settings, buf.clone(), false), buf)
    }

    #[test]
    fn test_handshake() {
        let (mut a, buf) = aei();
        a.execute("aei").unwrap();
        a.execute("isready").unwrap();
        let text = buf.text();
        assert!(text.starts_with("protocol-version 1\n"));
        assert!(text.contains("id name arimaa-zoo\n"));
        assert!(text.contains("aeiok\n"));
        assert!(text.ends_with("readyok\n"));
    }

    #[test]
    fn test_unknown_command() {
        let (mut a, _) = aei();
        assert!(matches!(a.execute("frobnicate 3"), Err(AeiError::UnknownCommand(_))));
        assert!(a.execute("").is_ok());
    }

    #[test]
    fn test_setposition_and_print() {
        let (mut a, buf) = aei();
        a.execute("setposition g [rrrrrrrrhdcemcdh                                HDCMECDHRRRRRRRR]")
            .unwrap();
        a.execute("print short").unwrap();
        assert!(buf.text().contains("log g [rrrrrrrrhdcemcdh"));
        assert!(a.execute("setposition x [oops]").is_err());
        assert!(a.execute("print zz").is_err());
    }

    #[test]
    fn test_makemove_and_extensions() {
        let (mut a, buf) = aei();
        a.execute("newstandard").unwrap();
        a.execute("makemove Ha2n Ha3n").unwrap();
        assert_eq!(a.engine().position().side(), Color::Silver);
        assert!(matches!(a.execute("makemove Ha4n"), Err(AeiError::Step(_))));
        a.execute("unmove").unwrap();
        a.execute("step Ha2n").unwrap();
        a.execute("unstep").unwrap();
        assert!(a.execute("pass").is_err());
        a.execute("step").unwrap();
        a.execute("eval").unwrap();
        a.execute("hash").unwrap();
        let text = buf.text();
        assert!(text.contains("log [0] Ha2n"));
        assert!(text.contains("log eval: 0"));
    }

    #[test]
    fn test_run_loop_reports_errors_and_quits() {
        let (mut a, buf) = aei();
        let input = "isready\nmakemove Zz9q\nnewstandard\ngo\nstop\nquit\nisready\n";
        a.run(Cursor::new(input)).unwrap();
        let text = buf.text();
        assert!(text.contains("log ERROR:"));
        assert!(text.contains("info nodes"));
        assert!(text.contains("bestmove "));
        // Nothing after quit is answered.
        assert_eq!(text.matches("readyok").count(), 1);
    }

    #[test]
    fn test_setup_bestmove() {
        let (mut a, buf) = aei();
        a.execute("newgame").unwrap();
        a.execute("go").unwrap();
        let text = buf.text();
        let line = text.lines().find(|l| l.starts_with("bestmove ")).unwrap();
        assert_eq!(line.split_whitespace().count(), 17);
    }

    #[test]
    fn test_ponder_has_no_bestmove() {
        let (mut a, buf) = aei();
        a.execute("newstandard").unwrap();
        a.execute("go ponder").unwrap();
        a.execute("stop").unwrap();
        let text = buf.text();
        assert!(text.contains("info score"));
        assert!(!text.contains("bestmove"));
        assert!(a.execute("go sideways").is_err());
    }

    #[test]
    fn test_setoption_and_movenow() {
        let (mut a, buf) = aei();
        a.execute("setoption name playouts value 20").unwrap();
        assert!(a.execute("setoption name nope value 1").is_err());
        a.execute("newstandard").unwrap();
        a.execute("movenow").unwrap();
        assert_eq!(a.engine().position().side(), Color::Silver);
        a.execute("pv").unwrap();
        assert!(buf.text().contains("log played "));
    }
}
