//! The `DecoderRegistry`.

use alloy_primitives::{Address, B256};
use chainledger_core::{
    decoder::{DecoderKind, ProtocolDecoder, Scope},
    entry::TxEntry,
    error::RegistryError,
};
use indexmap::IndexMap;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, info};

struct Registration {
    decoder: Arc<dyn ProtocolDecoder>,
    scopes: Vec<Scope>,
}

/// A decoder returned by lookup, with its registration position.
#[derive(Clone, Copy)]
pub struct RegisteredDecoder<'a> {
    /// Position in registration order; lower wins ties between equals
    pub position: usize,
    pub decoder: &'a Arc<dyn ProtocolDecoder>,
}

impl fmt::Debug for RegisteredDecoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredDecoder")
            .field("position", &self.position)
            .field("name", &self.decoder.name())
            .finish()
    }
}

/// Scoped decoder lookup.
#[derive(Default)]
pub struct DecoderRegistry {
    /// name → registration; iteration order is registration order
    decoders: IndexMap<String, Registration>,
    by_address_topic: HashMap<(Address, B256), Vec<usize>>,
    by_address: HashMap<Address, Vec<usize>>,
    by_topic: HashMap<B256, Vec<usize>>,
    global: Vec<usize>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder under its own declared scopes.
    pub fn register_decoder(&mut self, decoder: Arc<dyn ProtocolDecoder>) -> Result<(), RegistryError> {
        let scopes = decoder.scopes();
        self.register(decoder, scopes)
    }

    /// Associate `decoder` with `scopes`.
    ///
    /// Registering a name that already exists replaces its decoder and
    /// scopes but keeps its original position. Two distinct protocol-specific
    /// decoders on an identical `(address, topic)` or topic key is a conflict.
    pub fn register(
        &mut self,
        decoder: Arc<dyn ProtocolDecoder>,
        scopes: impl IntoIterator<Item = Scope>,
    ) -> Result<(), RegistryError> {
        let name = decoder.name().to_string();
        let mut scopes: Vec<Scope> = scopes.into_iter().collect();
        scopes.sort();
        scopes.dedup();
        if scopes.is_empty() {
            return Err(RegistryError::EmptyScopes { name });
        }

        if decoder.kind() == DecoderKind::Specific {
            self.check_conflicts(&name, &scopes)?;
        }

        let replaced = self
            .decoders
            .insert(name.clone(), Registration { decoder, scopes })
            .is_some();
        self.reindex();

        if replaced {
            info!(decoder = %name, "replaced decoder registration");
        } else {
            debug!(decoder = %name, position = self.decoders.len() - 1, "registered decoder");
        }
        Ok(())
    }

    fn check_conflicts(&self, name: &str, scopes: &[Scope]) -> Result<(), RegistryError> {
        for (existing, reg) in &self.decoders {
            if existing == name || reg.decoder.kind() != DecoderKind::Specific {
                continue;
            }
            let clash = scopes.iter().find(|s| {
                matches!(s, Scope::AddressTopic { .. } | Scope::Topic { .. }) && reg.scopes.contains(s)
            });
            if let Some(scope) = clash {
                return Err(RegistryError::Conflict {
                    existing: existing.clone(),
                    incoming: name.to_string(),
                    scope: scope.to_string(),
                });
            }
        }
        Ok(())
    }

    fn reindex(&mut self) {
        self.by_address_topic.clear();
        self.by_address.clear();
        self.by_topic.clear();
        self.global.clear();

        for (pos, reg) in self.decoders.values().enumerate() {
            for scope in &reg.scopes {
                match *scope {
                    Scope::Global => self.global.push(pos),
                    Scope::Address { address } => {
                        self.by_address.entry(address).or_default().push(pos)
                    }
                    Scope::AddressTopic { address, topic } => self
                        .by_address_topic
                        .entry((address, topic))
                        .or_default()
                        .push(pos),
                    Scope::Topic { topic } => self.by_topic.entry(topic).or_default().push(pos),
                }
            }
        }
    }

    /// Decoders to try for an `(address, topic0)` pair, tiered and deduplicated.
    pub fn lookup(&self, address: Address, topic0: Option<B256>) -> Vec<RegisteredDecoder<'_>> {
        let mut positions: Vec<usize> = Vec::new();
        let mut push_all = |list: Option<&Vec<usize>>| {
            for &p in list.into_iter().flatten() {
                if !positions.contains(&p) {
                    positions.push(p);
                }
            }
        };

        if let Some(topic) = topic0 {
            push_all(self.by_address_topic.get(&(address, topic)));
        }
        push_all(self.by_address.get(&address));
        if let Some(topic) = topic0 {
            push_all(self.by_topic.get(&topic));
        }
        push_all(Some(&self.global));

        positions.into_iter().filter_map(|p| self.at(p)).collect()
    }

    /// Decoders that should be offered `entry`, filtered by capability.
    pub fn decoders_for(&self, entry: &TxEntry) -> Vec<RegisteredDecoder<'_>> {
        let topic = entry.lookup_topic();
        self.lookup(entry.lookup_address(), topic)
            .into_iter()
            .filter(|r| {
                let caps = r.decoder.capabilities();
                match entry {
                    TxEntry::Log(_) => caps.logs,
                    TxEntry::Native(_) => caps.transfers,
                }
            })
            .collect()
    }

    /// Decoders with the transaction-level capability, in registration order.
    pub fn transaction_decoders(&self) -> Vec<RegisteredDecoder<'_>> {
        self.decoders
            .values()
            .enumerate()
            .filter(|(_, reg)| reg.decoder.capabilities().transaction)
            .map(|(position, reg)| RegisteredDecoder {
                position,
                decoder: &reg.decoder,
            })
            .collect()
    }

    fn at(&self, position: usize) -> Option<RegisteredDecoder<'_>> {
        self.decoders
            .get_index(position)
            .map(|(_, reg)| RegisteredDecoder {
                position,
                decoder: &reg.decoder,
            })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProtocolDecoder>> {
        self.decoders.get(name).map(|r| &r.decoder)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.decoders.get_index_of(name)
    }

    pub fn scopes(&self, name: &str) -> Option<&[Scope]> {
        self.decoders.get(name).map(|r| r.scopes.as_slice())
    }

    /// Registered decoder names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.decoders.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Make the registry immutable and shareable across workers.
    pub fn freeze(self) -> Arc<Self> {
        info!(decoders = self.decoders.len(), "decoder registry frozen");
        Arc::new(self)
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainledger_core::{
        decoder::Capabilities,
        entry::{NativeTransfer, RawLogEntry},
    };
    use alloy_primitives::U256;

    struct Stub {
        name: &'static str,
        kind: DecoderKind,
        caps: Capabilities,
        scopes: Vec<Scope>,
    }

    impl ProtocolDecoder for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> DecoderKind {
            self.kind
        }
        fn capabilities(&self) -> Capabilities {
            self.caps
        }
        fn scopes(&self) -> Vec<Scope> {
            self.scopes.clone()
        }
    }

    fn stub(name: &'static str, kind: DecoderKind, scopes: Vec<Scope>) -> Arc<dyn ProtocolDecoder> {
        Arc::new(Stub { name, kind, caps: Capabilities::LOGS, scopes })
    }

    const POOL: Address = Address::repeat_byte(0x10);
    const TOPIC: B256 = B256::repeat_byte(0xee);

    fn names(found: Vec<RegisteredDecoder<'_>>) -> Vec<String> {
        found.iter().map(|r| r.decoder.name().to_string()).collect()
    }

    #[test]
    fn lookup_follows_tiers() {
        let mut reg = DecoderRegistry::new();
        reg.register_decoder(stub("global", DecoderKind::Generic, vec![Scope::Global])).unwrap();
        reg.register_decoder(stub("by-topic", DecoderKind::Generic, vec![Scope::Topic { topic: TOPIC }]))
            .unwrap();
        reg.register_decoder(stub("by-address", DecoderKind::Specific, vec![Scope::Address { address: POOL }]))
            .unwrap();
        reg.register_decoder(stub(
            "exact",
            DecoderKind::Specific,
            vec![Scope::AddressTopic { address: POOL, topic: TOPIC }],
        ))
        .unwrap();

        assert_eq!(
            names(reg.lookup(POOL, Some(TOPIC))),
            vec!["exact", "by-address", "by-topic", "global"]
        );
        assert_eq!(names(reg.lookup(Address::ZERO, Some(TOPIC))), vec!["by-topic", "global"]);
        assert_eq!(names(reg.lookup(POOL, None)), vec!["by-address", "global"]);
    }

    #[test]
    fn lookup_deduplicates_multi_scope_decoders() {
        let mut reg = DecoderRegistry::new();
        reg.register_decoder(stub(
            "multi",
            DecoderKind::Specific,
            vec![Scope::Address { address: POOL }, Scope::Global],
        ))
        .unwrap();
        assert_eq!(names(reg.lookup(POOL, Some(TOPIC))), vec!["multi"]);
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut reg = DecoderRegistry::new();
        reg.register_decoder(stub("a", DecoderKind::Specific, vec![Scope::Address { address: POOL }]))
            .unwrap();
        reg.register_decoder(stub("b", DecoderKind::Generic, vec![Scope::Global])).unwrap();
        reg.register_decoder(stub("a", DecoderKind::Specific, vec![Scope::Topic { topic: TOPIC }]))
            .unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.position("a"), Some(0));
        assert_eq!(names(reg.lookup(POOL, None)), vec!["b"]);
        assert_eq!(names(reg.lookup(Address::ZERO, Some(TOPIC))), vec!["a", "b"]);
    }

    #[test]
    fn specific_conflict_is_rejected() {
        let mut reg = DecoderRegistry::new();
        let scope = Scope::Topic { topic: TOPIC };
        reg.register_decoder(stub("first", DecoderKind::Specific, vec![scope])).unwrap();
        // generic overlap is fine
        reg.register_decoder(stub("fallback", DecoderKind::Generic, vec![scope])).unwrap();

        let err = reg
            .register_decoder(stub("second", DecoderKind::Specific, vec![scope]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { ref existing, .. } if existing == "first"));
        assert!(reg.get("second").is_none());
    }

    #[test]
    fn empty_scopes_rejected() {
        let mut reg = DecoderRegistry::new();
        let err = reg.register_decoder(stub("none", DecoderKind::Generic, vec![])).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyScopes { .. }));
    }

    #[test]
    fn capability_filtering() {
        let mut reg = DecoderRegistry::new();
        reg.register_decoder(stub("logs-only", DecoderKind::Generic, vec![Scope::Global])).unwrap();
        reg.register_decoder(Arc::new(Stub {
            name: "transfers-only",
            kind: DecoderKind::Generic,
            caps: Capabilities::TRANSFERS,
            scopes: vec![Scope::Global],
        }))
        .unwrap();
        reg.register_decoder(Arc::new(Stub {
            name: "gas",
            kind: DecoderKind::Generic,
            caps: Capabilities::TRANSACTION,
            scopes: vec![Scope::Global],
        }))
        .unwrap();

        let log = TxEntry::Log(RawLogEntry {
            address: POOL,
            topics: vec![TOPIC],
            data: vec![],
            log_index: 0,
            tx_hash: B256::ZERO,
        });
        let native = TxEntry::Native(NativeTransfer {
            from: Address::ZERO,
            to: POOL,
            amount: U256::from(1u64),
            call_index: 0,
            depth: 0,
            tx_hash: B256::ZERO,
        });
        assert_eq!(names(reg.decoders_for(&log)), vec!["logs-only"]);
        assert_eq!(names(reg.decoders_for(&native)), vec!["transfers-only"]);
        assert_eq!(names(reg.transaction_decoders()), vec!["gas"]);
    }
}
