//! Auto-bet strategies.
//!
//! A strategy is a list of rules, each pairing a trigger with an action. After
//! every settled round the rules are evaluated in order against the session
//! state to produce the next bet or a stop. Nothing here touches a store; the
//! caller submits each planned bet through settlement with `BetType::Auto`.

use crate::games::payout;
use crate::games::settlement::BetRequest;
use crate::games::types::{BetType, Direction, Hundredths, Wager};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountUnit {
    Bets,
    Wins,
    Losses,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    Wins,
    Losses,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Profit,
    Loss,
    Balance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    GreaterThanEqual,
    LowerThan,
    LowerThanEqual,
}

impl Comparison {
    fn holds(self, value: i64, threshold: i64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterThanEqual => value >= threshold,
            Comparison::LowerThan => value < threshold,
            Comparison::LowerThanEqual => value <= threshold,
        }
    }
}

/// When a rule fires
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum Trigger {
    AfterWin,
    AfterLoss,
    /// Every `count` bets, wins or losses since the session started
    Every { count: u64, unit: CountUnit },
    /// Each time the current streak reaches a multiple of `count`
    EveryStreakOf { count: u64, kind: StreakKind },
    /// Once per streak, when it reaches exactly `count`
    FirstStreakOf { count: u64, kind: StreakKind },
    StreakGreater { count: u64, kind: StreakKind },
    StreakLower { count: u64, kind: StreakKind },
    /// Session profit, session loss or balance compared against `cents`
    Threshold {
        metric: Metric,
        comparison: Comparison,
        cents: i64,
    },
}

/// What a rule does when it fires
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "do", content = "value", rename_all = "snake_case")]
pub enum Action {
    IncreaseBetPercent(f64),
    DecreaseBetPercent(f64),
    IncreaseWinChancePercent(f64),
    DecreaseWinChancePercent(f64),
    AddToBet(u64),
    SubtractFromBet(u64),
    AddToWinChance(Hundredths),
    SubtractFromWinChance(Hundredths),
    SetBet(u64),
    SetWinChance(Hundredths),
    SwitchOverUnder,
    ResetBet,
    ResetWinChance,
    Stop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyRule {
    pub trigger: Trigger,
    pub action: Action,
}

impl StrategyRule {
    pub fn new(trigger: Trigger, action: Action) -> Self {
        Self { trigger, action }
    }
}

/// Named rule sets offered out of the box
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Martingale,
    DelayedMartingale,
    Paroli,
    Dalembert,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Martingale => "martingale",
            Preset::DelayedMartingale => "delayed_martingale",
            Preset::Paroli => "paroli",
            Preset::Dalembert => "dalembert",
        }
    }

    pub fn rules(self, base_bet: u64) -> Vec<StrategyRule> {
        use Action::*;
        use Trigger::*;
        match self {
            Preset::Martingale => vec![
                StrategyRule::new(AfterLoss, IncreaseBetPercent(100.0)),
                StrategyRule::new(AfterWin, ResetBet),
            ],
            Preset::DelayedMartingale => vec![
                StrategyRule::new(
                    StreakGreater { count: 2, kind: StreakKind::Losses },
                    IncreaseBetPercent(100.0),
                ),
                StrategyRule::new(AfterWin, ResetBet),
            ],
            Preset::Paroli => vec![
                StrategyRule::new(AfterWin, IncreaseBetPercent(100.0)),
                StrategyRule::new(FirstStreakOf { count: 3, kind: StreakKind::Wins }, ResetBet),
                StrategyRule::new(AfterLoss, ResetBet),
            ],
            Preset::Dalembert => vec![
                StrategyRule::new(AfterLoss, AddToBet(base_bet)),
                StrategyRule::new(AfterWin, SubtractFromBet(base_bet)),
            ],
        }
    }
}

/// Session parameters fixed when auto-betting starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoBetConfig {
    /// Cents
    pub base_bet: u64,
    pub base_win_chance: Hundredths,
    pub base_direction: Direction,
    /// Zero runs until another stop applies
    #[serde(default)]
    pub number_of_bets: u64,
    /// Stop once session profit reaches this many cents
    #[serde(default)]
    pub stop_on_profit: Option<u64>,
    /// Stop once session loss reaches this many cents
    #[serde(default)]
    pub stop_on_loss: Option<u64>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub rules: Vec<StrategyRule>,
    pub min_bet: u64,
    pub max_bet: u64,
    pub min_win_chance: Hundredths,
    pub max_win_chance: Hundredths,
}

/// Running state of an auto-bet session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoBetState {
    pub bets_placed: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_streak: u64,
    pub loss_streak: u64,
    /// Cents, may be negative
    pub profit: i64,
    pub current_bet: u64,
    pub current_win_chance: Hundredths,
    pub direction: Direction,
}

impl AutoBetState {
    pub fn new(config: &AutoBetConfig) -> Self {
        Self {
            bets_placed: 0,
            wins: 0,
            losses: 0,
            win_streak: 0,
            loss_streak: 0,
            profit: 0,
            current_bet: config.base_bet,
            current_win_chance: config.base_win_chance,
            direction: config.base_direction,
        }
    }

    fn streak(&self, kind: StreakKind) -> u64 {
        match kind {
            StreakKind::Wins => self.win_streak,
            StreakKind::Losses => self.loss_streak,
        }
    }
}

/// Result of one settled round, as seen by the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub win: bool,
    /// Cents
    pub profit: i64,
}

impl From<&Wager> for RoundOutcome {
    fn from(wager: &Wager) -> Self {
        Self {
            win: wager.win,
            profit: wager.profit,
        }
    }
}

/// The next bet of a running session
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBet {
    pub bet_amount: u64,
    pub target: Hundredths,
    pub direction: Direction,
    pub win_chance: Hundredths,
    pub round_number: u64,
}

impl PlannedBet {
    pub fn into_request(self, strategy: Option<String>) -> BetRequest {
        BetRequest {
            bet_amount: self.bet_amount,
            target: self.target,
            direction: self.direction,
            bet_type: BetType::Auto,
            round_number: Some(self.round_number),
            strategy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BetCountReached,
    ProfitTargetReached,
    LossLimitReached,
    StrategyStop,
    InsufficientBalance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoBetDecision {
    Continue(PlannedBet),
    Stop(StopReason),
}

/// Target that gives `win_chance` for `direction`. The target to win-chance
/// map is its own inverse, so this is the same mapping settlement uses.
fn target_for(direction: Direction, win_chance: Hundredths) -> Hundredths {
    payout::win_chance(direction, win_chance)
}

fn scale(value: u64, percent: f64) -> u64 {
    let scaled = (value as f64 * (1.0 + percent / 100.0)).round();
    if scaled.is_finite() && scaled > 0.0 {
        scaled.min(u64::MAX as f64) as u64
    } else {
        0
    }
}

fn fires(trigger: &Trigger, state: &AutoBetState, outcome: RoundOutcome, balance: u64) -> bool {
    let every = |count: u64, n: u64| count > 0 && n > 0 && n % count == 0;
    match *trigger {
        Trigger::AfterWin => outcome.win,
        Trigger::AfterLoss => !outcome.win,
        Trigger::Every { count, unit } => match unit {
            CountUnit::Bets => every(count, state.bets_placed),
            CountUnit::Wins => outcome.win && every(count, state.wins),
            CountUnit::Losses => !outcome.win && every(count, state.losses),
        },
        Trigger::EveryStreakOf { count, kind } => every(count, state.streak(kind)),
        Trigger::FirstStreakOf { count, kind } => count > 0 && state.streak(kind) == count,
        Trigger::StreakGreater { count, kind } => state.streak(kind) > count,
        Trigger::StreakLower { count, kind } => {
            let streak = state.streak(kind);
            streak > 0 && streak < count
        }
        Trigger::Threshold {
            metric,
            comparison,
            cents,
        } => {
            let value = match metric {
                Metric::Profit => state.profit,
                Metric::Loss => state.profit.saturating_neg(),
                Metric::Balance => i64::try_from(balance).unwrap_or(i64::MAX),
            };
            comparison.holds(value, cents)
        }
    }
}

/// Returns false when the action stops the session
fn apply(action: &Action, state: &mut AutoBetState, config: &AutoBetConfig) -> bool {
    let chance = state.current_win_chance.raw();
    match *action {
        Action::IncreaseBetPercent(p) => state.current_bet = scale(state.current_bet, p),
        Action::DecreaseBetPercent(p) => state.current_bet = scale(state.current_bet, -p),
        Action::IncreaseWinChancePercent(p) => {
            state.current_win_chance = Hundredths::from_raw(scale(u64::from(chance), p).min(u64::from(u32::MAX)) as u32)
        }
        Action::DecreaseWinChancePercent(p) => {
            state.current_win_chance = Hundredths::from_raw(scale(u64::from(chance), -p).min(u64::from(u32::MAX)) as u32)
        }
        Action::AddToBet(cents) => state.current_bet = state.current_bet.saturating_add(cents),
        Action::SubtractFromBet(cents) => state.current_bet = state.current_bet.saturating_sub(cents),
        Action::AddToWinChance(delta) => {
            state.current_win_chance = Hundredths::from_raw(chance.saturating_add(delta.raw()))
        }
        Action::SubtractFromWinChance(delta) => {
            state.current_win_chance = Hundredths::from_raw(chance.saturating_sub(delta.raw()))
        }
        Action::SetBet(cents) => state.current_bet = cents,
        Action::SetWinChance(value) => state.current_win_chance = value,
        Action::SwitchOverUnder => state.direction = state.direction.opposite(),
        Action::ResetBet => state.current_bet = config.base_bet,
        Action::ResetWinChance => state.current_win_chance = config.base_win_chance,
        Action::Stop => return false,
    }
    true
}

/// The first bet of a session, before any round has settled
pub fn first_bet(state: &AutoBetState, config: &AutoBetConfig, balance: u64) -> AutoBetDecision {
    plan(state, config, balance)
}

fn plan(state: &AutoBetState, config: &AutoBetConfig, balance: u64) -> AutoBetDecision {
    let bet_amount = state
        .current_bet
        .max(config.min_bet)
        .min(config.max_bet)
        .min(balance);
    if bet_amount < config.min_bet || bet_amount == 0 {
        return AutoBetDecision::Stop(StopReason::InsufficientBalance);
    }
    let win_chance = state
        .current_win_chance
        .max(config.min_win_chance)
        .min(config.max_win_chance);
    AutoBetDecision::Continue(PlannedBet {
        bet_amount,
        target: target_for(state.direction, win_chance),
        direction: state.direction,
        win_chance,
        round_number: state.bets_placed + 1,
    })
}

/// Fold one settled round into the session and decide what happens next.
///
/// `balance` is the account balance after the round, in cents.
pub fn next_bet(
    state: &AutoBetState,
    outcome: RoundOutcome,
    config: &AutoBetConfig,
    balance: u64,
) -> (AutoBetState, AutoBetDecision) {
    let mut next = state.clone();
    next.bets_placed += 1;
    next.profit = next.profit.saturating_add(outcome.profit);
    if outcome.win {
        next.wins += 1;
        next.win_streak += 1;
        next.loss_streak = 0;
    } else {
        next.losses += 1;
        next.loss_streak += 1;
        next.win_streak = 0;
    }

    for rule in &config.rules {
        if fires(&rule.trigger, &next, outcome, balance) && !apply(&rule.action, &mut next, config) {
            return (next, AutoBetDecision::Stop(StopReason::StrategyStop));
        }
    }

    if config.number_of_bets > 0 && next.bets_placed >= config.number_of_bets {
        return (next, AutoBetDecision::Stop(StopReason::BetCountReached));
    }
    if let Some(target) = config.stop_on_profit {
        if next.profit >= i64::try_from(target).unwrap_or(i64::MAX) {
            return (next, AutoBetDecision::Stop(StopReason::ProfitTargetReached));
        }
    }
    if let Some(limit) = config.stop_on_loss {
        if next.profit.saturating_neg() >= i64::try_from(limit).unwrap_or(i64::MAX) {
            return (next, AutoBetDecision::Stop(StopReason::LossLimitReached));
        }
    }

    let decision = plan(&next, config, balance);
    (next, decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIN: RoundOutcome = RoundOutcome { win: true, profit: 98 };

    fn loss(bet: u64) -> RoundOutcome {
        RoundOutcome {
            win: false,
            profit: -(bet as i64),
        }
    }

    fn config(rules: Vec<StrategyRule>) -> AutoBetConfig {
        AutoBetConfig {
            base_bet: 100,
            base_win_chance: Hundredths::from_raw(5_000),
            base_direction: Direction::Under,
            number_of_bets: 0,
            stop_on_profit: None,
            stop_on_loss: None,
            strategy: None,
            rules,
            min_bet: 1,
            max_bet: 1_000_000,
            min_win_chance: Hundredths::from_raw(1),
            max_win_chance: Hundredths::from_raw(9_500),
        }
    }

    fn planned(decision: &AutoBetDecision) -> &PlannedBet {
        match decision {
            AutoBetDecision::Continue(bet) => bet,
            AutoBetDecision::Stop(reason) => panic!("unexpected stop: {:?}", reason),
        }
    }

    #[test]
    fn test_first_bet_uses_base_values() {
        let config = config(vec![]);
        let state = AutoBetState::new(&config);
        let decision = first_bet(&state, &config, 10_000);
        let bet = planned(&decision);
        assert_eq!(bet.bet_amount, 100);
        assert_eq!(bet.target, Hundredths::from_raw(5_000));
        assert_eq!(bet.round_number, 1);
    }

    #[test]
    fn test_martingale_doubles_then_resets() {
        let config = config(Preset::Martingale.rules(100));
        let state = AutoBetState::new(&config);

        let (state, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 200);
        let (state, decision) = next_bet(&state, loss(200), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 400);
        let (state, decision) = next_bet(&state, WIN, &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 100);
        assert_eq!(state.bets_placed, 3);
        assert_eq!(state.win_streak, 1);
    }

    #[test]
    fn test_delayed_martingale_waits_for_streak() {
        let config = config(Preset::DelayedMartingale.rules(100));
        let state = AutoBetState::new(&config);
        let (state, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 100);
        let (state, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 100);
        let (_, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 200);
    }

    #[test]
    fn test_paroli_resets_after_three_wins() {
        let config = config(Preset::Paroli.rules(100));
        let mut state = AutoBetState::new(&config);
        let mut bets = Vec::new();
        for _ in 0..3 {
            let (next, decision) = next_bet(&state, WIN, &config, 10_000);
            bets.push(planned(&decision).bet_amount);
            state = next;
        }
        assert_eq!(bets, vec![200, 400, 100]);
    }

    #[test]
    fn test_bet_capped_by_balance_and_max() {
        let mut config = config(vec![StrategyRule::new(Trigger::AfterLoss, Action::SetBet(5_000))]);
        config.max_bet = 2_000;
        let state = AutoBetState::new(&config);
        let (_, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(planned(&decision).bet_amount, 2_000);
        let (_, decision) = next_bet(&state, loss(100), &config, 700);
        assert_eq!(planned(&decision).bet_amount, 700);
        let (_, decision) = next_bet(&state, loss(100), &config, 0);
        assert_eq!(decision, AutoBetDecision::Stop(StopReason::InsufficientBalance));
    }

    #[test]
    fn test_builtin_stops() {
        let mut config = config(vec![]);
        config.number_of_bets = 2;
        let state = AutoBetState::new(&config);
        let (state, decision) = next_bet(&state, WIN, &config, 10_000);
        assert!(matches!(decision, AutoBetDecision::Continue(_)));
        let (_, decision) = next_bet(&state, WIN, &config, 10_000);
        assert_eq!(decision, AutoBetDecision::Stop(StopReason::BetCountReached));

        let mut config = self::config(vec![]);
        config.stop_on_loss = Some(150);
        let state = AutoBetState::new(&config);
        let (state, _) = next_bet(&state, loss(100), &config, 10_000);
        let (_, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(decision, AutoBetDecision::Stop(StopReason::LossLimitReached));

        let mut config = self::config(vec![]);
        config.stop_on_profit = Some(50);
        let state = AutoBetState::new(&config);
        let (_, decision) = next_bet(&state, WIN, &config, 10_000);
        assert_eq!(decision, AutoBetDecision::Stop(StopReason::ProfitTargetReached));
    }

    #[test]
    fn test_planned_target_settles_at_planned_win_chance() {
        for direction in [Direction::Under, Direction::Over] {
            for chance in [1u32, 2_500, 4_950, 9_500] {
                let mut config = config(vec![]);
                config.base_direction = direction;
                config.base_win_chance = Hundredths::from_raw(chance);
                let state = AutoBetState::new(&config);
                let decision = first_bet(&state, &config, 10_000);
                let bet = planned(&decision);
                assert_eq!(payout::win_chance(bet.direction, bet.target), bet.win_chance);
                assert_eq!(bet.win_chance, Hundredths::from_raw(chance));
            }
        }
    }

    #[test]
    fn test_switch_direction_and_win_chance_clamp() {
        let config = config(vec![
            StrategyRule::new(Trigger::AfterWin, Action::SwitchOverUnder),
            StrategyRule::new(Trigger::AfterWin, Action::AddToWinChance(Hundredths::from_raw(9_000))),
        ]);
        let state = AutoBetState::new(&config);
        let (state, decision) = next_bet(&state, WIN, &config, 10_000);
        let bet = planned(&decision);
        assert_eq!(bet.direction, Direction::Over);
        assert_eq!(bet.win_chance, Hundredths::from_raw(9_500));
        assert_eq!(bet.target, Hundredths::from_raw(500));
        assert_eq!(state.direction, Direction::Over);
    }

    #[test]
    fn test_threshold_stop_rule() {
        let config = config(vec![StrategyRule::new(
            Trigger::Threshold {
                metric: Metric::Loss,
                comparison: Comparison::GreaterThanEqual,
                cents: 200,
            },
            Action::Stop,
        )]);
        let state = AutoBetState::new(&config);
        let (state, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert!(matches!(decision, AutoBetDecision::Continue(_)));
        let (_, decision) = next_bet(&state, loss(100), &config, 10_000);
        assert_eq!(decision, AutoBetDecision::Stop(StopReason::StrategyStop));
    }

    #[test]
    fn test_every_n_bets() {
        let config = config(vec![StrategyRule::new(
            Trigger::Every { count: 2, unit: CountUnit::Bets },
            Action::AddToBet(10),
        )]);
        let mut state = AutoBetState::new(&config);
        let mut bets = Vec::new();
        for _ in 0..4 {
            let (next, decision) = next_bet(&state, WIN, &config, 10_000);
            bets.push(planned(&decision).bet_amount);
            state = next;
        }
        assert_eq!(bets, vec![100, 110, 110, 120]);
    }

    #[test]
    fn test_rules_deserialize_from_json() {
        let json = r#"[
            {"trigger": {"on": "after_loss"}, "action": {"do": "increase_bet_percent", "value": 100.0}},
            {"trigger": {"on": "first_streak_of", "count": 3, "kind": "wins"}, "action": {"do": "reset_bet"}}
        ]"#;
        let rules: Vec<StrategyRule> = serde_json::from_str(json).unwrap();
        assert_eq!(rules[0].action, Action::IncreaseBetPercent(100.0));
        assert_eq!(
            rules[1].trigger,
            Trigger::FirstStreakOf { count: 3, kind: StreakKind::Wins }
        );
    }

    #[test]
    fn test_planned_bet_becomes_auto_request() {
        let config = config(vec![]);
        let state = AutoBetState::new(&config);
        let request = planned(&first_bet(&state, &config, 1_000))
            .clone()
            .into_request(Some("martingale".to_string()));
        assert_eq!(request.bet_type, BetType::Auto);
        assert_eq!(request.round_number, Some(1));
    }
}
