//! Search orchestration.
//!
//! The [`Engine`] owns the game position, the settings, the transposition
//! table and the search tree between searches. A search runs on its own
//! thread, which fans out into `concurrency` workers sharing one [`Tree`]
//! and, when a time budget applies, a timer thread.
//!
//! Two flags coordinate a search: `running` is observable state, set for
//! the lifetime of the search thread, and `stopping` asks every worker to
//! finish its current iteration and exit. Workers raise `stopping`
//! themselves when the playout or depth budget is spent; the timer raises
//! it when the turn budget elapses; the protocol raises it on `stop`.
//!
//! Move 1 is never searched. The engine samples setups instead (see
//! [`crate::setup`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::constants::{BUDGET_CHECK_PERIOD, MAX_STEPS};
use crate::error::{AeiError, StepError};
use crate::eval::{self, order_moves};
use crate::evaluator::EvaluatorKind;
use crate::mcts::Tree;
use crate::movegen::root_moves;
use crate::position::Position;
use crate::settings::{Settings, parse_setoption};
use crate::setup::best_setup;
use crate::step::{Move, Step};
use crate::table::Table;

/// How often the timer looks at the clock and the stop flag.
const TIMER_POLL: Duration = Duration::from_millis(5);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GoMode {
    /// Search within the configured budget and report a move.
    Normal,
    /// Search on the opponent's time until stopped. No move is reported.
    Ponder,
    /// Search until stopped, then report a move.
    Infinite,
}

/// Outcome of one search.
#[derive(Clone, Debug)]
pub struct SearchReport {
    pub mode: GoMode,
    pub best: Option<Move>,
    /// `best` with captures spelled out.
    pub notation: String,
    /// Value in `[-1, 1]` for the side to move.
    pub value: f64,
    pub nodes: u64,
    pub playouts: u64,
    pub hashfull: usize,
    pub elapsed: Duration,
}

impl SearchReport {
    /// The value on the scale used by `info score`.
    pub fn score(&self) -> i32 {
        (self.value * 1000.0).round() as i32
    }

    /// Whether the controller expects a `bestmove` line.
    pub fn wants_bestmove(&self) -> bool {
        self.mode != GoMode::Ponder
    }

    /// `info` lines describing the search.
    pub fn info_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("info score {}", self.score()),
            format!("info nodes {}", self.nodes),
        ];
        if !self.notation.is_empty() {
            lines.push(format!("info pv {}", self.notation));
        }
        lines.push(format!("info hashfull {}", self.hashfull));
        lines
    }
}

/// Called on the search thread once a background search finishes.
pub type Reporter = Box<dyn FnOnce(&SearchReport) + Send>;

// =============================================================================
// Search Job
// =============================================================================

/// Everything a search thread needs, detached from the engine.
struct Job {
    tree: Tree,
    table: Option<Arc<Table>>,
    mode: GoMode,
    evaluator: EvaluatorKind,
    seed: u64,
    concurrency: usize,
    playouts: u64,
    depth: u8,
    min_depth: u8,
    deadline: Option<Duration>,
    stopping: Arc<AtomicBool>,
}

impl Job {
    fn run(self) -> (Tree, SearchReport) {
        let start = Instant::now();
        let claimed = AtomicU64::new(0);
        let done = AtomicU64::new(0);
        let job = &self;
        thread::scope(|s| {
            for w in 0..job.concurrency.max(1) {
                let seed = job.seed.wrapping_add(w as u64);
                let (claimed, done) = (&claimed, &done);
                s.spawn(move || job.work(seed, claimed, done));
            }
            if let Some(budget) = job.deadline {
                s.spawn(move || job.time_out(start, budget));
            }
        });

        let elapsed = start.elapsed();
        let table = self.table.as_deref();
        if let Some(t) = table {
            self.tree.save_root(t);
        }
        let root = self.tree.root_position();
        let (best, value) = match self.tree.best_move() {
            Some((mv, v)) => (Some(mv), v),
            None => (None, self.tree.root().mean().clamp(-1.0, 1.0)),
        };
        let notation = best
            .as_ref()
            .map(|mv| root.annotate(mv).unwrap_or_else(|_| mv.to_string()))
            .unwrap_or_default();
        let report = SearchReport {
            mode: self.mode,
            best,
            notation,
            value,
            nodes: self.tree.nodes(),
            playouts: done.load(Ordering::Acquire),
            hashfull: table.map_or(0, Table::hashfull),
            elapsed,
        };
        debug!(
            playouts = report.playouts,
            nodes = report.nodes,
            value = report.value,
            ?elapsed,
            "search finished"
        );
        (self.tree, report)
    }

    fn work(&self, seed: u64, claimed: &AtomicU64, done: &AtomicU64) {
        let mut evaluator = self.evaluator.build(seed);
        let mut pos = self.tree.root_position().clone();
        let table = self.table.as_deref();
        let mut iterations = 0u64;
        while !self.stopping.load(Ordering::Acquire) {
            if self.playouts > 0 && claimed.fetch_add(1, Ordering::AcqRel) >= self.playouts {
                self.stopping.store(true, Ordering::Release);
                break;
            }
            self.tree.playout(&mut pos, evaluator.as_mut(), table);
            iterations += 1;
            if iterations % BUDGET_CHECK_PERIOD == 0 && self.budget_spent() {
                self.stopping.store(true, Ordering::Release);
            }
        }
        done.fetch_add(iterations, Ordering::AcqRel);
    }

    /// Depth reached or result decided. Only a normal search stops early.
    fn budget_spent(&self) -> bool {
        if self.mode != GoMode::Normal {
            return false;
        }
        (self.depth > 0 && self.tree.best_line_len() >= self.depth as usize)
            || self.tree.is_decided()
    }

    /// Raise `stopping` once `budget` has elapsed. A line shorter than
    /// `min_depth` holds the stop back for at most one more budget.
    fn time_out(&self, start: Instant, budget: Duration) {
        let Some(end) = start.checked_add(budget) else {
            return;
        };
        let hard_end = end.checked_add(budget).unwrap_or(end);
        while !self.stopping.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < end {
                thread::sleep((end - now).min(TIMER_POLL));
                continue;
            }
            let deep = self.tree.best_line_len() >= self.min_depth as usize;
            if deep || self.tree.is_decided() || now >= hard_end {
                if !deep {
                    debug!(min_depth = self.min_depth, "stopping short of mindepth");
                }
                info!(?budget, "turn budget elapsed");
                self.stopping.store(true, Ordering::Release);
                break;
            }
            thread::sleep((hard_end - now).min(TIMER_POLL));
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

fn seeded_rng(seed: u64) -> fastrand::Rng {
    match seed {
        0 => fastrand::Rng::new(),
        s => fastrand::Rng::with_seed(s),
    }
}

pub struct Engine {
    settings: Settings,
    pos: Position,
    table: Arc<Table>,
    tree: Option<Tree>,
    search: Option<JoinHandle<(Tree, SearchReport)>>,
    stopping: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    rng: fastrand::Rng,
    /// When the side to move started its turn.
    turn_clock: Instant,
    last: Option<SearchReport>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        let table = Arc::new(Table::new(settings.hash_mb));
        let rng = seeded_rng(settings.seed);
        Engine {
            settings,
            pos: Position::new(),
            table,
            tree: None,
            search: None,
            stopping: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            rng,
            turn_clock: Instant::now(),
            last: None,
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn position(&self) -> &Position {
        &self.pos
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The report of the most recent finished search.
    pub fn last_report(&self) -> Option<&SearchReport> {
        self.last.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // =========================================================================
    // Options
    // =========================================================================

    /// Handle the arguments of `setoption`.
    pub fn set_option(&mut self, args: &str) -> Result<(), AeiError> {
        let (name, value) = parse_setoption(args)?;
        self.apply_option(&name, &value)
    }

    /// Apply one option by name.
    pub fn apply_option(&mut self, name: &str, value: &str) -> Result<(), AeiError> {
        if name == "hash" && self.is_running() {
            return Err(AeiError::Busy("resize the table"));
        }
        let hash_mb = self.settings.hash_mb;
        self.settings.set(name, value)?;
        if self.settings.hash_mb != hash_mb {
            self.wait();
            let mb = self.settings.hash_mb;
            match Arc::get_mut(&mut self.table) {
                Some(t) => t.resize(mb),
                None => self.table = Arc::new(Table::new(mb)),
            }
            info!(mb, clusters = self.table.cluster_count(), "table resized");
        }
        if name == "seed" {
            self.rng = seeded_rng(self.settings.seed);
        }
        Ok(())
    }

    // =========================================================================
    // Game State
    // =========================================================================

    pub fn new_game(&mut self) {
        self.halt();
        self.pos = Position::new();
        self.tree = None;
        self.last = None;
        self.table.clear();
        self.settings.time.reset_game();
        self.turn_clock = Instant::now();
    }

    pub fn set_position(&mut self, pos: Position) {
        self.halt();
        self.pos = pos;
        self.turn_clock = Instant::now();
    }

    /// Play `mv` for the side to move and charge the time it took.
    pub fn make_move(&mut self, mv: &Move) -> Result<(), StepError> {
        self.halt();
        let side = self.pos.side();
        let spent = self.turn_clock.elapsed();
        self.pos.make_move(mv)?;
        self.settings.time.record_turn(side, spent);
        self.turn_clock = Instant::now();
        Ok(())
    }

    pub fn step(&mut self, step: Step) -> Result<(), StepError> {
        self.halt();
        self.pos.step(step).map(|_| ())
    }

    pub fn unstep(&mut self) -> Result<Step, StepError> {
        self.halt();
        self.pos.unstep()
    }

    pub fn pass(&mut self) -> Result<(), StepError> {
        self.halt();
        self.pos.pass()
    }

    pub fn unpass(&mut self) -> Result<(), StepError> {
        self.halt();
        self.pos.unpass()
    }

    pub fn unmove(&mut self) -> Result<Move, StepError> {
        self.halt();
        self.pos.unmove()
    }

    /// Static score of the position for the side to move.
    pub fn eval(&self) -> i32 {
        eval::score(&self.pos)
    }

    /// Root moves ordered best first, at most `limit` of them (0 for all).
    pub fn ordered_moves(&self, limit: usize) -> Vec<(Move, i32)> {
        let mut moves = order_moves(&self.pos, root_moves(&self.pos, MAX_STEPS));
        if limit > 0 {
            moves.truncate(limit);
        }
        moves
    }

    // =========================================================================
    // Search
    // =========================================================================

    fn setup_report(&mut self, mode: GoMode) -> SearchReport {
        let start = Instant::now();
        let best = best_setup(&self.pos, &mut self.rng);
        let notation = best.as_ref().map(Move::to_string).unwrap_or_default();
        SearchReport {
            mode,
            best,
            notation,
            value: 0.0,
            nodes: 0,
            playouts: 0,
            hashfull: self.table.hashfull(),
            elapsed: start.elapsed(),
        }
    }

    fn prepare(&mut self, mode: GoMode) -> Job {
        let settings = &self.settings;
        let table = settings.use_table.then(|| Arc::clone(&self.table));
        if let Some(t) = &table {
            t.new_search();
        }
        let seed = self.rng.u64(..);
        let mut evaluator = settings.evaluator.build(seed);
        let tree = match self.tree.take() {
            Some(mut tree) if tree.uses_table() == table.is_some() => {
                if tree.update_root(&self.pos, evaluator.as_mut(), table.as_deref()) {
                    debug!("search tree rebuilt for new root");
                }
                tree
            }
            _ => Tree::new(&self.pos, evaluator.as_mut(), table.as_deref()),
        };
        let normal = mode == GoMode::Normal;
        let timed = settings.time.is_configured() || (settings.playouts == 0 && settings.depth == 0);
        let deadline = (normal && timed)
            .then(|| settings.time.turn_budget(self.pos.side(), self.pos.move_num()));
        info!(?mode, ?deadline, workers = settings.concurrency, "search started");
        Job {
            tree,
            table,
            mode,
            evaluator: settings.evaluator,
            seed,
            concurrency: settings.concurrency,
            playouts: if normal { settings.playouts } else { 0 },
            depth: if normal { settings.depth.min(MAX_STEPS) } else { 0 },
            min_depth: settings.min_depth.min(MAX_STEPS),
            deadline,
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Search the current position on this thread within the configured
    /// budget.
    pub fn search(&mut self) -> SearchReport {
        self.halt();
        let report = if self.pos.is_setup() {
            self.setup_report(GoMode::Normal)
        } else {
            let job = self.prepare(GoMode::Normal);
            self.stopping.store(false, Ordering::Release);
            self.running.store(true, Ordering::Release);
            let (tree, report) = job.run();
            self.running.store(false, Ordering::Release);
            self.tree = Some(tree);
            report
        };
        self.last = Some(report.clone());
        report
    }

    /// Start a search in the background. `reporter` runs on the search
    /// thread when it finishes, or right away for a setup move.
    pub fn go(&mut self, mode: GoMode, reporter: Reporter) -> Result<(), AeiError> {
        if self.is_running() {
            return Err(AeiError::Busy("go"));
        }
        self.wait();
        if mode == GoMode::Ponder && (!self.settings.use_ponder || self.pos.is_setup()) {
            debug!("not pondering");
            return Ok(());
        }
        if self.pos.is_setup() {
            let report = self.setup_report(mode);
            reporter(&report);
            self.last = Some(report);
            return Ok(());
        }

        let job = self.prepare(mode);
        self.stopping.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name("search".to_string())
            .spawn(move || {
                let (tree, report) = job.run();
                reporter(&report);
                running.store(false, Ordering::Release);
                (tree, report)
            });
        match spawned {
            Ok(handle) => {
                self.search = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Stop the current search and wait for it to report.
    pub fn stop(&mut self) {
        self.stopping.store(true, Ordering::Release);
        self.wait();
    }

    /// Stop any search before the position changes.
    fn halt(&mut self) {
        if self.search.is_some() {
            self.stop();
        }
    }

    /// Collect a finished search thread.
    fn wait(&mut self) {
        let Some(handle) = self.search.take() else {
            return;
        };
        match handle.join() {
            Ok((tree, report)) => {
                self.tree = Some(tree);
                self.last = Some(report);
            }
            Err(_) => {
                warn!("search thread panicked");
                self.running.store(false, Ordering::Release);
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn settings(playouts: u64, concurrency: usize) -> Settings {
        Settings {
            playouts,
            concurrency,
            hash_mb: 1,
            seed: 7,
            ..Settings::default()
        }
    }

    fn place(side: char, pieces: &[(&str, char)]) -> Position {
        let mut cells = [' '; 64];
        for (s, c) in pieces {
            let sq: crate::square::Square = s.parse().unwrap();
            cells[(7 - sq.rank() as usize) * 8 + sq.file() as usize] = *c;
        }
        Position::from_short(&format!("{side} [{}]", cells.iter().collect::<String>())).unwrap()
    }

    #[test]
    fn test_search_with_playout_budget() {
        let mut engine = Engine::new(settings(200, 1));
        engine.set_position(Position::standard());
        let report = engine.search();
        assert_eq!(report.playouts, 200);
        let best = report.best.clone().unwrap();
        let mut pos = Position::standard();
        pos.make_move(&best).unwrap();
        assert!(report.nodes > 1);
        assert_eq!(report.info_lines().len(), 4);
    }

    #[test]
    fn test_parallel_search() {
        let mut engine = Engine::new(settings(400, 4));
        engine.set_position(Position::standard());
        let report = engine.search();
        assert_eq!(report.playouts, 400);
        let mut pos = Position::standard();
        pos.make_move(report.best.as_ref().unwrap()).unwrap();
    }

    #[test]
    fn test_search_finds_goal() {
        let mut engine = Engine::new(settings(500, 1));
        engine.set_position(place('g', &[("g7", 'R'), ("a7", 'r'), ("b8", 'e')]));
        let report = engine.search();
        assert_eq!(report.notation, "Rg7n");
        assert_eq!(report.score(), 1000);
        assert!(report.playouts <= 500);
    }

    #[test]
    fn test_setup_move() {
        let mut engine = Engine::new(settings(10, 1));
        let report = engine.search();
        let best = report.best.unwrap();
        assert!(best.is_setup());
        assert_eq!(best.len(), 16);
        engine.make_move(&best).unwrap();
        let report = engine.search();
        engine.make_move(report.best.as_ref().unwrap()).unwrap();
        assert!(!engine.position().is_setup());
    }

    #[test]
    fn test_go_infinite_then_stop() {
        let mut engine = Engine::new(settings(0, 2));
        engine.set_position(Position::standard());
        let (tx, rx) = mpsc::channel();
        engine
            .go(GoMode::Infinite, Box::new(move |r| tx.send(r.clone()).unwrap()))
            .unwrap();
        assert!(matches!(
            engine.go(GoMode::Normal, Box::new(|_| {})),
            Err(AeiError::Busy(_))
        ));
        thread::sleep(Duration::from_millis(50));
        engine.stop();
        assert!(!engine.is_running());
        let report = rx.recv().unwrap();
        assert!(report.wants_bestmove());
        assert!(report.best.is_some());
        assert!(engine.last_report().is_some());
    }

    #[test]
    fn test_ponder_reports_no_move() {
        let mut engine = Engine::new(settings(0, 1));
        engine.set_position(Position::standard());
        let (tx, rx) = mpsc::channel();
        engine
            .go(GoMode::Ponder, Box::new(move |r| tx.send(r.mode).unwrap()))
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        // Changing the position stops the ponder search.
        engine.make_move(&"Ha2n".parse().unwrap()).unwrap();
        assert_eq!(rx.recv().unwrap(), GoMode::Ponder);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_ponder_disabled() {
        let mut s = settings(0, 1);
        s.use_ponder = false;
        let mut engine = Engine::new(s);
        engine.set_position(Position::standard());
        engine.go(GoMode::Ponder, Box::new(|_| panic!("no report"))).unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_time_budget_stops_search() {
        let mut engine = Engine::new(settings(0, 1));
        engine.set_option("name tcmove value 1").unwrap();
        engine.set_position(Position::standard());
        let report = engine.search();
        assert!(report.elapsed >= Duration::from_millis(700));
        assert!(report.elapsed < Duration::from_secs(10));
        assert!(report.best.is_some());
    }

    #[test]
    fn test_time_budget_overrides_unreachable_mindepth() {
        // Every gold step freezes the rabbit, so no line is two steps long.
        let mut engine = Engine::new(settings(0, 1));
        engine.set_option("name tcmove value 1").unwrap();
        engine.set_option("name mindepth value 2").unwrap();
        engine.set_position(place('g', &[("h1", 'R'), ("f1", 'd'), ("h3", 'd'), ("a8", 'r')]));
        let (tx, rx) = mpsc::channel();
        engine
            .go(GoMode::Normal, Box::new(move |r| tx.send(r.clone()).unwrap()))
            .unwrap();
        let report = rx.recv_timeout(Duration::from_secs(15)).unwrap();
        assert!(report.elapsed >= Duration::from_millis(700));
        assert!(report.best.is_some());
        engine.wait();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_huge_clock_options_do_not_overflow() {
        let mut engine = Engine::new(settings(100, 1));
        engine.set_option("name tcmove value 18446744073709551615").unwrap();
        engine.set_option("name tcreserve value 18446744073709551615").unwrap();
        engine.set_option("name tcpercent value 100").unwrap();
        engine.set_position(Position::standard());
        let report = engine.search();
        assert_eq!(report.playouts, 100);
        engine.make_move(report.best.as_ref().unwrap()).unwrap();
        assert_eq!(engine.settings().time.reserves[0], Duration::MAX);
    }

    #[test]
    fn test_depth_budget() {
        let mut engine = Engine::new(settings(0, 1));
        engine.set_option("name depth value 1").unwrap();
        engine.set_position(Position::standard());
        let report = engine.search();
        assert!(report.playouts >= BUDGET_CHECK_PERIOD);
        assert!(report.best.is_some());
    }

    #[test]
    fn test_hash_option_resizes_table() {
        let mut engine = Engine::new(settings(0, 1));
        let before = engine.table().cluster_count();
        engine.set_option("name hash value 2").unwrap();
        assert!(engine.table().cluster_count() > before);
        assert!(engine.set_option("name hash value x").is_err());
    }

    #[test]
    fn test_make_move_records_time() {
        let mut engine = Engine::new(settings(0, 1));
        engine.set_option("name tcmove value 30").unwrap();
        engine.set_option("name tcreserve value 60").unwrap();
        engine.set_option("name tcpercent value 100").unwrap();
        engine.set_position(Position::standard());
        engine.make_move(&"Ha2n".parse().unwrap()).unwrap();
        assert!(engine.settings().time.reserves[0] > Duration::from_secs(60));
        assert!(engine.make_move(&"Ha3n".parse().unwrap()).is_err());
        engine.unmove().unwrap();
        assert_eq!(engine.position().to_short(), Position::standard().to_short());
    }
}
