//! Win chance and payout arithmetic.
//!
//! Money is integer cents. The multiplier is `(100 / win_chance) * (1 - edge)`
//! and the payout is the bet times the multiplier, rounded half away from zero.

use crate::errors::{DiceResult, GameError};
use crate::games::types::{Direction, Hundredths};

/// Probability of winning, in percent, for a bet on `direction` of `target`
pub fn win_chance(direction: Direction, target: Hundredths) -> Hundredths {
    match direction {
        Direction::Under => target,
        Direction::Over => Hundredths::from_raw(Hundredths::HUNDRED.raw().saturating_sub(target.raw())),
    }
}

/// Whether `roll` wins a bet on `direction` of `target`. Ties lose.
pub fn is_win(direction: Direction, target: Hundredths, roll: Hundredths) -> bool {
    match direction {
        Direction::Under => roll < target,
        Direction::Over => roll > target,
    }
}

/// Gross multiplier for a win chance after the house edge
pub fn payout_multiplier(win_chance: Hundredths, house_edge: f64) -> DiceResult<f64> {
    if win_chance.raw() == 0 || win_chance > Hundredths::HUNDRED {
        return Err(GameError::validation(format!(
            "Win chance {} is outside (0, 100]",
            win_chance
        )));
    }
    if !(0.0..1.0).contains(&house_edge) {
        return Err(GameError::validation(format!(
            "House edge {} is outside [0, 1)",
            house_edge
        )));
    }
    Ok((100.0 / win_chance.as_f64()) * (1.0 - house_edge))
}

/// Multiplier as presented to players, rounded to four decimals
pub fn display_multiplier(multiplier: f64) -> f64 {
    (multiplier * 10_000.0).round() / 10_000.0
}

/// Payout in cents for a winning bet
pub fn payout_cents(bet_cents: u64, multiplier: f64) -> DiceResult<u64> {
    let payout = (bet_cents as f64 * multiplier).round();
    if !payout.is_finite() || payout < 0.0 || payout >= u64::MAX as f64 {
        return Err(GameError::validation(format!(
            "Payout for bet of {} cents overflows",
            bet_cents
        )));
    }
    Ok(payout as u64)
}

/// Payout and profit for a settled bet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub multiplier: f64,
    pub payout: u64,
    pub profit: i64,
}

/// Settle `bet_cents` given whether the roll won
pub fn settle(bet_cents: u64, multiplier: f64, win: bool) -> DiceResult<Settlement> {
    let payout = if win { payout_cents(bet_cents, multiplier)? } else { 0 };
    let profit = i64::try_from(i128::from(payout) - i128::from(bet_cents))
        .map_err(|_| GameError::validation("Profit out of range"))?;
    Ok(Settlement {
        multiplier,
        payout,
        profit,
    })
}
