//! Pure construction of the ordered call list for one rebalance step.
//!
//! Nothing here touches the chain: callers read balances, allowances and quotes first, then hand
//! the results in. Order within a returned plan is the order calls must land in.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use clients_uniswapv3::{calldata, PositionInfo};

use crate::contracts::IProject;
use crate::types::ActionKind;

const BPS: u128 = 10_000;

/// One state-mutating call, ready to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub kind: ActionKind,
    /// Contract the call is sent to
    pub target: Address,
    pub token_id: Option<U256>,
    pub calldata: Bytes,
}

/// Liquidity removed on the decrease path: `floor(liquidity * bps / 10000)`, or all of it when
/// that floors to zero.
pub fn liquidity_to_remove(liquidity: u128, rebalance_bps: u32) -> u128 {
    let bps = u128::from(rebalance_bps.min(10_000));
    let share = (liquidity / BPS) * bps + (liquidity % BPS) * bps / BPS;
    if share == 0 {
        liquidity
    } else {
        share
    }
}

/// Minimum accepted output for a simulated `quote`; zero when slippage protection is off.
pub fn min_amount(quote: U256, slippage_bps: Option<u32>) -> U256 {
    let Some(slippage) = slippage_bps else {
        return U256::ZERO;
    };
    let bps = U256::from(BPS);
    let keep = U256::from(10_000 - slippage.min(10_000));
    (quote / bps) * keep + (quote % bps) * keep / bps
}

/// Unix-seconds deadline `offset_secs` from `now_secs`.
pub fn deadline(now_secs: u64, offset_secs: u64) -> U256 {
    U256::from(now_secs.saturating_add(offset_secs))
}

pub fn plan_accrue(project: Address) -> PlannedAction {
    PlannedAction {
        kind: ActionKind::AccrueInterest,
        target: project,
        token_id: None,
        calldata: IProject::accrueInterestCall {}.abi_encode().into(),
    }
}

/// `decreaseLiquidity` followed by `collect` of everything owed to `recipient`.
///
/// Collect must come second: owed amounts are only credited once liquidity is removed.
pub fn plan_decrease(
    position_manager: Address,
    recipient: Address,
    token_id: U256,
    liquidity: u128,
    amount_mins: (U256, U256),
    deadline: U256,
) -> Vec<PlannedAction> {
    vec![
        PlannedAction {
            kind: ActionKind::DecreaseLiquidity,
            target: position_manager,
            token_id: Some(token_id),
            calldata: calldata::decrease_liquidity(
                token_id,
                liquidity,
                amount_mins.0,
                amount_mins.1,
                deadline,
            ),
        },
        PlannedAction {
            kind: ActionKind::Collect,
            target: position_manager,
            token_id: Some(token_id),
            calldata: calldata::collect_all(token_id, recipient),
        },
    ]
}

/// Wallet holdings of one pool token, as read just before planning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFunds {
    pub token: Address,
    pub balance: U256,
    /// Current allowance granted to the position manager
    pub allowance: U256,
}

impl TokenFunds {
    fn needs_approval(&self) -> bool {
        self.balance > self.allowance
    }
}

/// Approvals for any token whose balance exceeds its allowance, then `increaseLiquidity` with the
/// full balances as desired amounts.
///
/// Returns an empty plan when the wallet holds neither token.
pub fn plan_increase(
    position_manager: Address,
    position: &PositionInfo,
    funds: [TokenFunds; 2],
    deadline: U256,
) -> Vec<PlannedAction> {
    let [funds0, funds1] = funds;
    if funds0.balance.is_zero() && funds1.balance.is_zero() {
        return Vec::new();
    }

    let mut actions: Vec<PlannedAction> = funds
        .iter()
        .filter(|f| f.needs_approval())
        .map(|f| PlannedAction {
            kind: ActionKind::Approve,
            target: f.token,
            token_id: Some(position.token_id),
            calldata: calldata::approve(position_manager, f.balance),
        })
        .collect();

    actions.push(PlannedAction {
        kind: ActionKind::IncreaseLiquidity,
        target: position_manager,
        token_id: Some(position.token_id),
        calldata: calldata::increase_liquidity(
            position.token_id,
            funds0.balance,
            funds1.balance,
            U256::ZERO,
            U256::ZERO,
            deadline,
        ),
    });
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::position;
    use clients_uniswapv3::{IPositionManager, IERC20};

    const NPM: Address = Address::repeat_byte(0xbb);
    const TOKEN0: Address = Address::repeat_byte(0x01);
    const TOKEN1: Address = Address::repeat_byte(0x02);

    fn funds(token: Address, balance: u64, allowance: u64) -> TokenFunds {
        TokenFunds {
            token,
            balance: U256::from(balance),
            allowance: U256::from(allowance),
        }
    }

    #[test]
    fn removal_is_floored_share_or_everything() {
        let cases = [
            (1_000_000u128, 2_500u32, 250_000u128),
            (10_001, 2_500, 2_500),
            (3, 2_500, 3),
            (1, 1, 1),
            (39_999, 2_500, 9_999),
            (u128::MAX, 10_000, u128::MAX),
        ];
        for (liquidity, bps, expected) in cases {
            assert_eq!(liquidity_to_remove(liquidity, bps), expected, "{} @ {}", liquidity, bps);
        }
    }

    #[test]
    fn min_amount_applies_tolerance() {
        assert_eq!(min_amount(U256::from(10_000u64), Some(100)), U256::from(9_900u64));
        assert_eq!(min_amount(U256::from(10_000u64), None), U256::ZERO);
        assert_eq!(min_amount(U256::from(7u64), Some(0)), U256::from(7u64));
        assert_eq!(min_amount(U256::MAX, Some(10_000)), U256::ZERO);
    }

    #[test]
    fn decrease_precedes_collect() {
        let plan = plan_decrease(
            NPM,
            Address::repeat_byte(0xd0),
            U256::from(5u64),
            250,
            (U256::from(1u64), U256::from(2u64)),
            U256::from(900u64),
        );
        let kinds: Vec<_> = plan.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::DecreaseLiquidity, ActionKind::Collect]);
        assert!(plan.iter().all(|a| a.target == NPM));

        let call = IPositionManager::decreaseLiquidityCall::abi_decode(&plan[0].calldata).unwrap();
        assert_eq!(call.params.liquidity, 250);
        assert_eq!(call.params.amount1Min, U256::from(2u64));
    }

    #[test]
    fn approvals_only_where_allowance_is_short() {
        let pos = position(9, TOKEN0, TOKEN1, 1_000);
        let plan = plan_increase(
            NPM,
            &pos,
            [funds(TOKEN0, 500, 0), funds(TOKEN1, 300, 300)],
            U256::from(900u64),
        );
        let kinds: Vec<_> = plan.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Approve, ActionKind::IncreaseLiquidity]);
        assert_eq!(plan[0].target, TOKEN0);

        let approve = IERC20::approveCall::abi_decode(&plan[0].calldata).unwrap();
        assert_eq!(approve.spender, NPM);
        assert_eq!(approve.amount, U256::from(500u64));

        let increase = IPositionManager::increaseLiquidityCall::abi_decode(&plan[1].calldata).unwrap();
        assert_eq!(increase.params.amount0Desired, U256::from(500u64));
        assert_eq!(increase.params.amount1Desired, U256::from(300u64));
        assert_eq!(increase.params.amount0Min, U256::ZERO);
    }

    #[test]
    fn nothing_to_add_without_balances() {
        let pos = position(9, TOKEN0, TOKEN1, 1_000);
        let plan = plan_increase(
            NPM,
            &pos,
            [funds(TOKEN0, 0, 0), funds(TOKEN1, 0, 10)],
            U256::ZERO,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn accrual_targets_project() {
        let project = Address::repeat_byte(0x10);
        let action = plan_accrue(project);
        assert_eq!(action.target, project);
        assert_eq!(action.token_id, None);
        assert_eq!(&action.calldata[..], IProject::accrueInterestCall::SELECTOR.as_slice());
    }
}
