//! AEI time control.
//!
//! The controller describes the game clock with the `tc*` options and keeps
//! the engine informed of each side's reserve and the time already spent on
//! the current move. From those [`TimeControl::turn_budget`] derives how long
//! the next search may run: whatever is left of the per-move allowance plus
//! a share of the reserve, capped by the per-turn and whole-game limits.
//!
//! All option values are whole seconds. Zero means unlimited.

use std::time::Duration;

use crate::constants::{DEFAULT_TURN_MILLIS, RESERVE_HORIZON_TURNS, TIME_MARGIN_MILLIS};
use crate::piece::Color;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeControl {
    /// Allowance per move (`tcmove`).
    pub move_time: Duration,
    /// Reserve at the start of the game (`tcreserve`).
    pub reserve: Duration,
    /// Percent of unused move time added to the reserve (`tcpercent`).
    pub percent: u32,
    /// Cap on the reserve (`tcmax`).
    pub max_reserve: Duration,
    /// Cap on the whole game (`tctotal`).
    pub total: Duration,
    /// Maximum number of turns in the game (`tcturns`).
    pub turns: u32,
    /// Cap on a single turn (`tcturntime`).
    pub turn_time: Duration,
    /// Current reserve per side (`greserve`, `sreserve`).
    pub reserves: [Duration; 2],
    /// Time used on each side's last turn (`gused`, `sused`).
    pub used: [Duration; 2],
    /// Time already used on the current move (`moveused`).
    pub move_used: Duration,
    /// Time used on the previous move (`lastmoveused`).
    pub last_move_used: Duration,
    /// Time used by both sides since the game started.
    pub game_used: Duration,
}

impl TimeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a time option to `secs` seconds (or a count, for `tcpercent`
    /// and `tcturns`). Returns `false` for names this type does not own.
    pub fn apply(&mut self, name: &str, secs: u64) -> bool {
        let d = Duration::from_secs(secs);
        match name {
            "tcmove" => self.move_time = d,
            "tcreserve" => {
                self.reserve = d;
                self.reserves = [d, d];
            }
            "tcpercent" => self.percent = secs.min(100) as u32,
            "tcmax" => self.max_reserve = d,
            "tctotal" => self.total = d,
            "tcturns" => self.turns = u32::try_from(secs).unwrap_or(u32::MAX),
            "tcturntime" => self.turn_time = d,
            "greserve" => self.reserves[Color::Gold.index()] = d,
            "sreserve" => self.reserves[Color::Silver.index()] = d,
            "gused" => self.used[Color::Gold.index()] = d,
            "sused" => self.used[Color::Silver.index()] = d,
            "moveused" => self.move_used = d,
            "lastmoveused" => self.last_move_used = d,
            _ => return false,
        }
        true
    }

    /// Whether any clock has been configured.
    pub fn is_configured(&self) -> bool {
        !(self.move_time.is_zero()
            && self.reserves.iter().all(Duration::is_zero)
            && self.turn_time.is_zero()
            && self.total.is_zero())
    }

    /// Time the engine may spend on the turn of `side` at `move_num`.
    pub fn turn_budget(&self, side: Color, move_num: u32) -> Duration {
        let margin = Duration::from_millis(TIME_MARGIN_MILLIS);
        if !self.is_configured() {
            return Duration::from_millis(DEFAULT_TURN_MILLIS).saturating_sub(margin);
        }
        let horizon = match self.turns {
            0 => RESERVE_HORIZON_TURNS,
            n => n.saturating_sub(move_num).clamp(1, RESERVE_HORIZON_TURNS),
        };
        let reserve = self.reserves[side.index()];
        let mut budget = self
            .move_time
            .saturating_sub(self.move_used)
            .saturating_add(reserve / horizon);
        if !self.turn_time.is_zero() {
            budget = budget.min(self.turn_time.saturating_sub(self.move_used));
        }
        if !self.total.is_zero() {
            budget = budget.min(self.total.saturating_sub(self.game_used));
        }
        budget.saturating_sub(margin)
    }

    /// Account for a finished turn of `side` that took `spent`: unused
    /// move time feeds the reserve and overruns drain it.
    pub fn record_turn(&mut self, side: Color, spent: Duration) {
        let i = side.index();
        if spent <= self.move_time {
            let unused = self.move_time - spent;
            let credit = unused.saturating_mul(self.percent) / 100;
            self.reserves[i] = self.reserves[i].saturating_add(credit);
        } else {
            self.reserves[i] = self.reserves[i].saturating_sub(spent - self.move_time);
        }
        if !self.max_reserve.is_zero() {
            self.reserves[i] = self.reserves[i].min(self.max_reserve);
        }
        self.used[i] = spent;
        self.last_move_used = spent;
        self.move_used = Duration::ZERO;
        self.game_used = self.game_used.saturating_add(spent);
    }

    /// Forget the per-game state, keeping the configured limits.
    pub fn reset_game(&mut self) {
        self.reserves = [self.reserve, self.reserve];
        self.used = [Duration::ZERO; 2];
        self.move_used = Duration::ZERO;
        self.last_move_used = Duration::ZERO;
        self.game_used = Duration::ZERO;
    }
}
