//! Aave v3 lending pool decoder.
//!
//! Pool events are paired with the ERC-20 transfers they explain: the
//! underlying asset moving to or from the aToken contract, and aToken or
//! debt-token mints and burns for the position holder. Each emitted event
//! is ordered at the log index of the transfer it interprets; when the
//! transfer cannot be found the pool log itself is used.

use alloy_core::dyn_abi::DynSolType;
use alloy_primitives::{address, Address, B256, U256};
use chainledger_core::{
    asset::AssetRef,
    chain::ChainId,
    context::DecodeContext,
    decoder::{Capabilities, DecodeOutcome, Decoded, DecoderKind, ProtocolDecoder, Scope},
    entry::{EntryIndex, OrderGroup, OrderKey, RawLogEntry},
    error::DecodeError,
    event::CandidateEvent,
    taxonomy::{Counterparty, HistoryEventSubType, HistoryEventType},
};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::abi::{topic_address, LogData};
use crate::fingerprint::{keccak256_signature, signatures};
use crate::transfer::{candidate_transfers, find_last, transfer_topic, TokenTransfer};

const SECONDS_PER_YEAR: u64 = 31_536_000;
const RAY_DECIMALS: u32 = 27;

/// Contract addresses of one Aave v3 deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AaveV3Deployment {
    pub pool: Address,
    pub incentives_controller: Option<Address>,
}

impl AaveV3Deployment {
    /// Canonical market for a chain, if Aave v3 is deployed there.
    pub fn for_chain(chain: &ChainId) -> Option<Self> {
        let (pool, incentives_controller) = match chain.slug.as_str() {
            "ethereum" => (
                address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
                Some(address!("8164Cc65827dcFe994AB23944CBC90e0aa80bFcb")),
            ),
            "polygon_pos" | "optimism" | "arbitrum_one" => (
                address!("794a61358D6845594F94dc1DB02A252b5b4814aD"),
                Some(address!("929EC64c34a17401F460460D4B9390518E5B473e")),
            ),
            "base" => (address!("A238Dd80C259a72e81d7e4664a9801593F98d1c5"), None),
            "gnosis" => (address!("b50201558B00496A145fE76f7424749556E326D8"), None),
            "scroll" => (address!("11fCfe756c05AD438e312a7fd934381537D3cFfe"), None),
            _ => return None,
        };
        Some(Self {
            pool,
            incentives_controller,
        })
    }
}

#[derive(Debug, Clone)]
struct Topics {
    supply: B256,
    withdraw: B256,
    borrow: B256,
    repay: B256,
    liquidation_call: B256,
    collateral_enabled: B256,
    collateral_disabled: B256,
    rewards_claimed: B256,
    reserve_data_updated: B256,
    transfer: B256,
}

impl Topics {
    fn new() -> Self {
        Self {
            supply: keccak256_signature(signatures::AAVE_SUPPLY),
            withdraw: keccak256_signature(signatures::AAVE_WITHDRAW),
            borrow: keccak256_signature(signatures::AAVE_BORROW),
            repay: keccak256_signature(signatures::AAVE_REPAY),
            liquidation_call: keccak256_signature(signatures::AAVE_LIQUIDATION_CALL),
            collateral_enabled: keccak256_signature(signatures::AAVE_COLLATERAL_ENABLED),
            collateral_disabled: keccak256_signature(signatures::AAVE_COLLATERAL_DISABLED),
            rewards_claimed: keccak256_signature(signatures::AAVE_REWARDS_CLAIMED),
            reserve_data_updated: keccak256_signature(signatures::AAVE_RESERVE_DATA_UPDATED),
            transfer: transfer_topic(),
        }
    }

    /// Pool events that move funds; each one bounds the transfer search of the next.
    fn is_action(&self, topic: &B256) -> bool {
        [
            self.supply,
            self.withdraw,
            self.borrow,
            self.repay,
            self.liquidation_call,
        ]
        .contains(topic)
    }
}

#[derive(Debug, Clone)]
pub struct AaveV3Decoder {
    pools: Vec<Address>,
    incentives: Vec<Address>,
    topics: Topics,
}

impl AaveV3Decoder {
    pub const NAME: &'static str = "aave-v3";

    pub fn new(deployment: AaveV3Deployment) -> Self {
        Self {
            pools: vec![deployment.pool],
            incentives: deployment.incentives_controller.into_iter().collect(),
            topics: Topics::new(),
        }
    }

    pub fn for_chain(chain: &ChainId) -> Option<Self> {
        AaveV3Deployment::for_chain(chain).map(Self::new)
    }

    fn event(
        &self,
        ctx: &DecodeContext<'_>,
        log_index: u64,
        event_type: HistoryEventType,
        event_subtype: HistoryEventSubType,
        asset: Address,
        amount: U256,
        actor: Address,
        address: Address,
    ) -> CandidateEvent {
        CandidateEvent::new(
            ctx.meta,
            OrderKey::new(OrderGroup::Log, log_index),
            event_type,
            event_subtype,
            AssetRef::Token(asset),
            amount,
            actor,
        )
        .with_counterparty(Counterparty::AaveV3)
        .with_address(address)
    }

    /// Unclaimed transfers between the previous pool action and `log`.
    fn transfers(&self, ctx: &DecodeContext<'_>, log: &RawLogEntry) -> Vec<TokenTransfer> {
        let after = ctx
            .logs()
            .filter(|(_, l)| {
                l.log_index < log.log_index
                    && self.pools.contains(&l.address)
                    && l.topic0().map_or(false, |t| self.topics.is_action(t))
            })
            .map(|(_, l)| l.log_index)
            .max();
        candidate_transfers(ctx, &self.topics.transfer, after, log.log_index)
    }

    fn supply(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let reserve = topic_address(log, 1)?;
        let on_behalf_of = topic_address(log, 2)?;
        let data = LogData::decode(&log.data, &[DynSolType::Address, DynSolType::Uint(256)])?;
        let user = data.address(0, "user")?;
        let amount = data.uint(1, "amount")?;

        let transfers = self.transfers(ctx, log);
        let mut out = Decoded::new();
        let mut taken = Vec::new();

        let underlying = find_last(&transfers, &taken, |t| {
            t.token == reserve && t.from == user && t.amount == amount
        });
        if let Some(u) = underlying {
            taken.push(u.entry);
            out = out.claim(u.entry);
        }
        let a_token = underlying.map(|u| u.to);
        let mint = find_last(&transfers, &taken, |t| {
            t.is_mint() && t.to == on_behalf_of && a_token.map_or(t.token != reserve, |a| t.token == a)
        });

        if ctx.is_tracked(&user) {
            let (at, address) = underlying.map_or((log.log_index, log.address), |u| (u.log_index, u.to));
            out = out.event(self.event(
                ctx,
                at,
                HistoryEventType::Deposit,
                HistoryEventSubType::DepositAsset,
                reserve,
                amount,
                user,
                address,
            ));
        }
        if let Some(m) = mint {
            out = out.claim(m.entry);
            if ctx.is_tracked(&on_behalf_of) {
                out = out.event(self.event(
                    ctx,
                    m.log_index,
                    HistoryEventType::Receive,
                    HistoryEventSubType::ReceiveWrapped,
                    m.token,
                    m.amount,
                    on_behalf_of,
                    Address::ZERO,
                ));
            }
        }
        Ok(out)
    }

    fn withdraw(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let reserve = topic_address(log, 1)?;
        let user = topic_address(log, 2)?;
        let to = topic_address(log, 3)?;
        let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "amount")?;

        let transfers = self.transfers(ctx, log);
        let mut out = Decoded::new();
        let mut taken = Vec::new();

        let underlying = find_last(&transfers, &taken, |t| {
            t.token == reserve && t.to == to && t.amount == amount
        });
        if let Some(u) = underlying {
            taken.push(u.entry);
            out = out.claim(u.entry);
        }
        let a_token = underlying.map(|u| u.from);
        let burn = find_last(&transfers, &taken, |t| {
            t.is_burn() && t.from == user && a_token.map_or(t.token != reserve, |a| t.token == a)
        });

        if let Some(b) = burn {
            out = out.claim(b.entry);
            if ctx.is_tracked(&user) {
                out = out.event(self.event(
                    ctx,
                    b.log_index,
                    HistoryEventType::Spend,
                    HistoryEventSubType::ReturnWrapped,
                    b.token,
                    b.amount,
                    user,
                    Address::ZERO,
                ));
            }
        }
        if ctx.is_tracked(&to) {
            let (at, address) = underlying.map_or((log.log_index, log.address), |u| (u.log_index, u.from));
            out = out.event(self.event(
                ctx,
                at,
                HistoryEventType::Withdrawal,
                HistoryEventSubType::RemoveAsset,
                reserve,
                amount,
                to,
                address,
            ));
        }
        Ok(out)
    }

    fn borrow(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let reserve = topic_address(log, 1)?;
        let on_behalf_of = topic_address(log, 2)?;
        let data = LogData::decode(
            &log.data,
            &[
                DynSolType::Address,
                DynSolType::Uint(256),
                DynSolType::Uint(8),
                DynSolType::Uint(256),
            ],
        )?;
        let user = data.address(0, "user")?;
        let amount = data.uint(1, "amount")?;
        let rate_mode = rate_mode_name(data.uint(2, "interestRateMode")?)?;
        let apy = ray_rate_to_apy_percent(data.uint(3, "borrowRate")?)?;

        let transfers = self.transfers(ctx, log);
        let mut out = Decoded::new();
        let mut taken = Vec::new();

        let underlying = find_last(&transfers, &taken, |t| {
            t.token == reserve && t.to == user && t.amount == amount
        });
        if let Some(u) = underlying {
            taken.push(u.entry);
            out = out.claim(u.entry);
        }
        let debt_mint = find_last(&transfers, &taken, |t| {
            t.is_mint() && t.to == on_behalf_of && t.token != reserve
        });

        if let Some(m) = debt_mint {
            out = out.claim(m.entry);
            if ctx.is_tracked(&on_behalf_of) {
                out = out.event(self.event(
                    ctx,
                    m.log_index,
                    HistoryEventType::Receive,
                    HistoryEventSubType::ReceiveWrapped,
                    m.token,
                    m.amount,
                    on_behalf_of,
                    Address::ZERO,
                ));
            }
        }
        if ctx.is_tracked(&user) {
            let (at, address) = underlying.map_or((log.log_index, log.address), |u| (u.log_index, u.from));
            out = out.event(
                self.event(
                    ctx,
                    at,
                    HistoryEventType::Receive,
                    HistoryEventSubType::GenerateDebt,
                    reserve,
                    amount,
                    user,
                    address,
                )
                .with_extra("rate_mode", rate_mode)
                .with_extra("apy", apy),
            );
        }
        Ok(out)
    }

    fn repay(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let reserve = topic_address(log, 1)?;
        let user = topic_address(log, 2)?;
        let repayer = topic_address(log, 3)?;
        let data = LogData::decode(&log.data, &[DynSolType::Uint(256), DynSolType::Bool])?;
        let amount = data.uint(0, "amount")?;
        let use_a_tokens = data.bool(1, "useATokens")?;

        let transfers = self.transfers(ctx, log);
        let mut out = Decoded::new();
        let mut taken = Vec::new();

        let underlying = if use_a_tokens {
            None
        } else {
            find_last(&transfers, &taken, |t| {
                t.token == reserve && t.from == repayer && t.amount == amount
            })
        };
        if let Some(u) = underlying {
            taken.push(u.entry);
            out = out.claim(u.entry);
        }
        // the debt burn precedes any aToken burn when repaying with aTokens
        let debt_burn = transfers
            .iter()
            .find(|t| !taken.contains(&t.entry) && t.is_burn() && t.from == user && t.token != reserve)
            .copied();

        if let Some(b) = debt_burn {
            out = out.claim(b.entry);
            if ctx.is_tracked(&user) {
                out = out.event(self.event(
                    ctx,
                    b.log_index,
                    HistoryEventType::Spend,
                    HistoryEventSubType::ReturnWrapped,
                    b.token,
                    b.amount,
                    user,
                    Address::ZERO,
                ));
            }
        }
        if ctx.is_tracked(&repayer) {
            let (at, address) = underlying.map_or((log.log_index, log.address), |u| (u.log_index, u.to));
            let mut payback = self.event(
                ctx,
                at,
                HistoryEventType::Spend,
                HistoryEventSubType::PaybackDebt,
                reserve,
                amount,
                repayer,
                address,
            );
            if use_a_tokens {
                payback = payback.with_extra("used_atokens", true);
            }
            out = out.event(payback);
        }
        Ok(out)
    }

    /// The liquidated user's outgoing transfers before the call: the first
    /// burn repays debt, a transfer to the liquidator (or a second burn) is
    /// the seized collateral, anything else is the protocol fee.
    fn liquidation(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let user = topic_address(log, 3)?;
        let data = LogData::decode(
            &log.data,
            &[
                DynSolType::Uint(256),
                DynSolType::Uint(256),
                DynSolType::Address,
                DynSolType::Bool,
            ],
        )?;
        let liquidator = data.address(2, "liquidator")?;
        if !ctx.is_tracked(&user) {
            return Ok(Decoded::new());
        }

        let mut out = Decoded::new();
        let mut debt_repaid = false;
        for t in self.transfers(ctx, log).iter().filter(|t| t.from == user) {
            let event = if t.is_burn() && !debt_repaid {
                debt_repaid = true;
                self.event(
                    ctx,
                    t.log_index,
                    HistoryEventType::Spend,
                    HistoryEventSubType::PaybackDebt,
                    t.token,
                    t.amount,
                    user,
                    log.address,
                )
                .with_extra("is_liquidation", true)
            } else if t.is_burn() || t.to == liquidator {
                self.event(
                    ctx,
                    t.log_index,
                    HistoryEventType::Spend,
                    HistoryEventSubType::Liquidate,
                    t.token,
                    t.amount,
                    user,
                    log.address,
                )
            } else {
                self.event(
                    ctx,
                    t.log_index,
                    HistoryEventType::Spend,
                    HistoryEventSubType::Fee,
                    t.token,
                    t.amount,
                    user,
                    t.to,
                )
            };
            out = out.claim(t.entry).event(event);
        }
        Ok(out)
    }

    fn collateral(
        &self,
        log: &RawLogEntry,
        ctx: &DecodeContext<'_>,
        action: &'static str,
    ) -> Result<Decoded, DecodeError> {
        let reserve = topic_address(log, 1)?;
        let user = topic_address(log, 2)?;
        if !ctx.is_tracked(&user) {
            return Ok(Decoded::new());
        }
        let event = self
            .event(
                ctx,
                log.log_index,
                HistoryEventType::Informational,
                HistoryEventSubType::None,
                reserve,
                U256::ZERO,
                user,
                log.address,
            )
            .with_extra("action", action);
        Ok(Decoded::new().event(event))
    }

    fn rewards(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let reward = topic_address(log, 2)?;
        let to = topic_address(log, 3)?;
        let data = LogData::decode(&log.data, &[DynSolType::Address, DynSolType::Uint(256)])?;
        let amount = data.uint(1, "amount")?;
        if !ctx.is_tracked(&to) {
            return Ok(Decoded::new());
        }

        let transfers = candidate_transfers(ctx, &self.topics.transfer, None, log.log_index);
        let payout = find_last(&transfers, &[], |t| {
            t.token == reward && t.to == to && t.amount == amount
        });
        let (at, address) = payout.map_or((log.log_index, log.address), |p| (p.log_index, p.from));
        let mut out = Decoded::new().event(self.event(
            ctx,
            at,
            HistoryEventType::Receive,
            HistoryEventSubType::Reward,
            reward,
            amount,
            to,
            address,
        ));
        if let Some(p) = payout {
            out = out.claim(p.entry);
        }
        Ok(out)
    }
}

impl ProtocolDecoder for AaveV3Decoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> DecoderKind {
        DecoderKind::Specific
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LOGS
    }

    fn counterparty(&self) -> Option<Counterparty> {
        Some(Counterparty::AaveV3)
    }

    fn scopes(&self) -> Vec<Scope> {
        self.pools
            .iter()
            .chain(self.incentives.iter())
            .map(|&address| Scope::Address { address })
            .collect()
    }

    fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let Some(log) = ctx.log(entry) else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let Some(topic) = log.topic0().copied() else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let t = &self.topics;

        let decoded = if self.pools.contains(&log.address) {
            if topic == t.supply {
                self.supply(log, ctx)?
            } else if topic == t.withdraw {
                self.withdraw(log, ctx)?
            } else if topic == t.borrow {
                self.borrow(log, ctx)?
            } else if topic == t.repay {
                self.repay(log, ctx)?
            } else if topic == t.liquidation_call {
                self.liquidation(log, ctx)?
            } else if topic == t.collateral_enabled {
                self.collateral(log, ctx, "enable_collateral")?
            } else if topic == t.collateral_disabled {
                self.collateral(log, ctx, "disable_collateral")?
            } else if topic == t.reserve_data_updated {
                // rate bookkeeping emitted alongside every action
                Decoded::new()
            } else {
                return Ok(DecodeOutcome::NoMatch);
            }
        } else if self.incentives.contains(&log.address) && topic == t.rewards_claimed {
            self.rewards(log, ctx)?
        } else {
            return Ok(DecodeOutcome::NoMatch);
        };
        Ok(decoded.claim(entry).into())
    }
}

fn rate_mode_name(mode: U256) -> Result<&'static str, DecodeError> {
    if mode == U256::from(1u8) {
        Ok("stable")
    } else if mode == U256::from(2u8) {
        Ok("variable")
    } else {
        Err(DecodeError::InvalidField {
            field: "interestRateMode".into(),
            reason: format!("unknown mode {mode}"),
        })
    }
}

/// Convert a per-second compounded ray rate into an APY percentage with
/// two decimals, e.g. `13.24`.
pub fn ray_rate_to_apy_percent(rate: U256) -> Result<String, DecodeError> {
    let out_of_range = || DecodeError::InvalidField {
        field: "borrowRate".into(),
        reason: format!("rate {rate} is out of range"),
    };
    let raw = u128::try_from(rate)
        .ok()
        .and_then(|r| i128::try_from(r).ok())
        .ok_or_else(out_of_range)?;
    let apr = Decimal::try_from_i128_with_scale(raw, RAY_DECIMALS).map_err(|_| out_of_range())?;
    let per_second = Decimal::ONE + apr / Decimal::from(SECONDS_PER_YEAR);
    let apy = compound(per_second, SECONDS_PER_YEAR)
        .and_then(|growth| (growth - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(out_of_range)?;
    let apy = apy.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(format!("{apy:.2}"))
}

/// `base^exp` by squaring; `None` on overflow.
fn compound(mut base: Decimal, mut exp: u64) -> Option<Decimal> {
    let mut acc = Decimal::ONE;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.checked_mul(base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.checked_mul(base)?;
        }
    }
    Some(acc)
}
