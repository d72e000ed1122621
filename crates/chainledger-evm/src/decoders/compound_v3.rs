//! Compound v3 (Comet) decoder.
//!
//! A Comet market is itself the ERC-20 of its base-asset position: supplying
//! base mints it, withdrawing burns it. Comet emits those mint/burn
//! `Transfer`s right after the `Supply`/`Withdraw` log, while the underlying
//! token moves before it. A base supply with no mint is a debt repayment; a
//! base withdrawal with no burn is a borrow.

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

use crate::abi::{topic_address, LogData};
use crate::fingerprint::{keccak256_signature, signatures};
use crate::transfer::{candidate_transfers, find_last, transfer_topic, TokenTransfer};

/// One Comet market and its base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CometMarket {
    pub comet: Address,
    pub base: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundV3Deployment {
    pub markets: Vec<CometMarket>,
    pub rewards: Address,
}

impl CompoundV3Deployment {
    pub fn for_chain(chain: &ChainId) -> Option<Self> {
        match chain.slug.as_str() {
            "ethereum" => Some(Self {
                markets: vec![
                    // cUSDCv3
                    CometMarket {
                        comet: address!("c3d688B66703497DAA19211EEdff47f25384cdc3"),
                        base: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                    },
                    // cWETHv3
                    CometMarket {
                        comet: address!("A17581A9E3356d9A858b789D68B4d866e593aE94"),
                        base: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
                    },
                ],
                rewards: address!("1B0e765F6224C21223AeA2af16c1C46E38885a40"),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Topics {
    supply: B256,
    withdraw: B256,
    supply_collateral: B256,
    withdraw_collateral: B256,
    reward_claimed: B256,
    transfer: B256,
}

#[derive(Debug, Clone)]
pub struct CompoundV3Decoder {
    markets: Vec<CometMarket>,
    rewards: Address,
    topics: Topics,
}

impl CompoundV3Decoder {
    pub const NAME: &'static str = "compound-v3";

    pub fn new(deployment: CompoundV3Deployment) -> Self {
        Self {
            markets: deployment.markets,
            rewards: deployment.rewards,
            topics: Topics {
                supply: keccak256_signature(signatures::COMET_SUPPLY),
                withdraw: keccak256_signature(signatures::COMET_WITHDRAW),
                supply_collateral: keccak256_signature(signatures::COMET_SUPPLY_COLLATERAL),
                withdraw_collateral: keccak256_signature(signatures::COMET_WITHDRAW_COLLATERAL),
                reward_claimed: keccak256_signature(signatures::COMET_REWARD_CLAIMED),
                transfer: transfer_topic(),
            },
        }
    }

    pub fn for_chain(chain: &ChainId) -> Option<Self> {
        CompoundV3Deployment::for_chain(chain).map(Self::new)
    }

    fn market(&self, comet: &Address) -> Option<CometMarket> {
        self.markets.iter().find(|m| &m.comet == comet).copied()
    }

    fn is_action(&self, log: &RawLogEntry) -> bool {
        let t = &self.topics;
        self.market(&log.address).is_some()
            && log.topic0().map_or(false, |topic| {
                [t.supply, t.withdraw, t.supply_collateral, t.withdraw_collateral].contains(topic)
            })
    }

    /// Transfers between the previous market action and `log`.
    fn preceding(&self, ctx: &DecodeContext<'_>, log: &RawLogEntry) -> Vec<TokenTransfer> {
        let after = ctx
            .logs()
            .filter(|(_, l)| l.log_index < log.log_index && self.is_action(l))
            .map(|(_, l)| l.log_index)
            .max();
        candidate_transfers(ctx, &self.topics.transfer, after, log.log_index)
    }

    /// Comet's own mint/burn emitted after `log`, before the next market action.
    fn wrapped_after(
        &self,
        ctx: &DecodeContext<'_>,
        log: &RawLogEntry,
        pred: impl Fn(&TokenTransfer) -> bool,
    ) -> Option<TokenTransfer> {
        let before = ctx
            .logs()
            .filter(|(_, l)| l.log_index > log.log_index && self.is_action(l))
            .map(|(_, l)| l.log_index)
            .min()
            .unwrap_or(u64::MAX);
        candidate_transfers(ctx, &self.topics.transfer, Some(log.log_index), before)
            .into_iter()
            .find(|t| t.token == log.address && pred(t))
    }

    fn event(
        &self,
        ctx: &DecodeContext<'_>,
        log_index: u64,
        kind: (HistoryEventType, HistoryEventSubType),
        asset: Address,
        amount: U256,
        actor: Address,
        address: Address,
    ) -> CandidateEvent {
        CandidateEvent::new(
            ctx.meta,
            OrderKey::new(OrderGroup::Log, log_index),
            kind.0,
            kind.1,
            AssetRef::Token(asset),
            amount,
            actor,
        )
        .with_counterparty(Counterparty::CompoundV3)
        .with_address(address)
    }

    fn supply(
        &self,
        market: CometMarket,
        log: &RawLogEntry,
        ctx: &DecodeContext<'_>,
    ) -> Result<Decoded, DecodeError> {
        let from = topic_address(log, 1)?;
        let dst = topic_address(log, 2)?;
        let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "amount")?;

        let mut out = Decoded::new();
        let underlying = find_last(&self.preceding(ctx, log), &[], |t| {
            t.token == market.base && t.from == from && t.to == market.comet && t.amount == amount
        });
        if let Some(u) = underlying {
            out = out.claim(u.entry);
        }
        let at = underlying.map_or(log.log_index, |u| u.log_index);
        let mint = self.wrapped_after(ctx, log, |t| t.is_mint() && t.to == dst);

        match mint {
            Some(m) => {
                out = out.claim(m.entry);
                if ctx.is_tracked(&from) {
                    out = out.event(self.event(
                        ctx,
                        at,
                        (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset),
                        market.base,
                        amount,
                        from,
                        market.comet,
                    ));
                }
                if ctx.is_tracked(&dst) {
                    out = out.event(self.event(
                        ctx,
                        m.log_index,
                        (HistoryEventType::Receive, HistoryEventSubType::ReceiveWrapped),
                        market.comet,
                        m.amount,
                        dst,
                        Address::ZERO,
                    ));
                }
            }
            None if ctx.is_tracked(&from) => {
                out = out.event(self.event(
                    ctx,
                    at,
                    (HistoryEventType::Spend, HistoryEventSubType::PaybackDebt),
                    market.base,
                    amount,
                    from,
                    market.comet,
                ));
            }
            None => {}
        }
        Ok(out)
    }

    fn withdraw(
        &self,
        market: CometMarket,
        log: &RawLogEntry,
        ctx: &DecodeContext<'_>,
    ) -> Result<Decoded, DecodeError> {
        let src = topic_address(log, 1)?;
        let to = topic_address(log, 2)?;
        let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "amount")?;

        let mut out = Decoded::new();
        let underlying = find_last(&self.preceding(ctx, log), &[], |t| {
            t.token == market.base && t.from == market.comet && t.to == to && t.amount == amount
        });
        if let Some(u) = underlying {
            out = out.claim(u.entry);
        }
        let at = underlying.map_or(log.log_index, |u| u.log_index);
        let burn = self.wrapped_after(ctx, log, |t| t.is_burn() && t.from == src);

        match burn {
            Some(b) => {
                out = out.claim(b.entry);
                if ctx.is_tracked(&src) {
                    out = out.event(self.event(
                        ctx,
                        b.log_index,
                        (HistoryEventType::Spend, HistoryEventSubType::ReturnWrapped),
                        market.comet,
                        b.amount,
                        src,
                        Address::ZERO,
                    ));
                }
                if ctx.is_tracked(&to) {
                    out = out.event(self.event(
                        ctx,
                        at,
                        (HistoryEventType::Withdrawal, HistoryEventSubType::RemoveAsset),
                        market.base,
                        amount,
                        to,
                        market.comet,
                    ));
                }
            }
            None if ctx.is_tracked(&to) => {
                out = out.event(self.event(
                    ctx,
                    at,
                    (HistoryEventType::Receive, HistoryEventSubType::GenerateDebt),
                    market.base,
                    amount,
                    to,
                    market.comet,
                ));
            }
            None => {}
        }
        Ok(out)
    }

    fn collateral(
        &self,
        market: CometMarket,
        log: &RawLogEntry,
        ctx: &DecodeContext<'_>,
        supplied: bool,
    ) -> Result<Decoded, DecodeError> {
        let owner = topic_address(log, 1)?;
        let counter = topic_address(log, 2)?;
        let asset = topic_address(log, 3)?;
        let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "amount")?;

        // supply: owner -> comet; withdraw: comet -> counter
        let (sender, recipient, actor, kind) = if supplied {
            (
                owner,
                market.comet,
                owner,
                (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset),
            )
        } else {
            (
                market.comet,
                counter,
                counter,
                (HistoryEventType::Withdrawal, HistoryEventSubType::RemoveAsset),
            )
        };

        let mut out = Decoded::new();
        let moved = find_last(&self.preceding(ctx, log), &[], |t| {
            t.token == asset && t.from == sender && t.to == recipient && t.amount == amount
        });
        if let Some(m) = moved {
            out = out.claim(m.entry);
        }
        if ctx.is_tracked(&actor) {
            let at = moved.map_or(log.log_index, |m| m.log_index);
            out = out.event(self.event(ctx, at, kind, asset, amount, actor, market.comet));
        }
        Ok(out)
    }

    fn reward(&self, log: &RawLogEntry, ctx: &DecodeContext<'_>) -> Result<Decoded, DecodeError> {
        let recipient = topic_address(log, 2)?;
        let token = topic_address(log, 3)?;
        let amount = LogData::decode(&log.data, &[DynSolType::Uint(256)])?.uint(0, "amount")?;
        if !ctx.is_tracked(&recipient) {
            return Ok(Decoded::new());
        }

        let transfers = candidate_transfers(ctx, &self.topics.transfer, None, log.log_index);
        let payout = find_last(&transfers, &[], |t| {
            t.token == token && t.to == recipient && t.amount == amount
        });
        let at = payout.map_or(log.log_index, |p| p.log_index);
        let mut out = Decoded::new().event(self.event(
            ctx,
            at,
            (HistoryEventType::Receive, HistoryEventSubType::Reward),
            token,
            amount,
            recipient,
            log.address,
        ));
        if let Some(p) = payout {
            out = out.claim(p.entry);
        }
        Ok(out)
    }
}

impl ProtocolDecoder for CompoundV3Decoder {
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
        Some(Counterparty::CompoundV3)
    }

    fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self
            .markets
            .iter()
            .map(|m| Scope::Address { address: m.comet })
            .collect();
        scopes.push(Scope::AddressTopic {
            address: self.rewards,
            topic: self.topics.reward_claimed,
        });
        scopes
    }

    fn decode(&self, entry: EntryIndex, ctx: &DecodeContext<'_>) -> Result<DecodeOutcome, DecodeError> {
        let Some(log) = ctx.log(entry) else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let Some(topic) = log.topic0().copied() else {
            return Ok(DecodeOutcome::NoMatch);
        };
        let t = &self.topics;

        let decoded = if let Some(market) = self.market(&log.address) {
            if topic == t.supply {
                self.supply(market, log, ctx)?
            } else if topic == t.withdraw {
                self.withdraw(market, log, ctx)?
            } else if topic == t.supply_collateral {
                self.collateral(market, log, ctx, true)?
            } else if topic == t.withdraw_collateral {
                self.collateral(market, log, ctx, false)?
            } else {
                // mint/burn transfers and accrual logs are interpreted from the action log
                return Ok(DecodeOutcome::NoMatch);
            }
        } else if log.address == self.rewards && topic == t.reward_claimed {
            self.reward(log, ctx)?
        } else {
            return Ok(DecodeOutcome::NoMatch);
        };
        Ok(decoded.claim(entry).into())
    }
}
