//! In-memory chain for tests.
//!
//! [`MockChain`] implements [`ChainClient`] over a tiny model of the three
//! college contracts (YD token, course registry, certificate minter). It
//! records every call so tests can assert on what was (or was not) sent,
//! and it can inject failures: transient read errors, wallet rejections,
//! simulation reverts and receipt timeouts.
//!
//! # Example
//!
//! ```ignore
//! let chain = MockChain::new(ContractSet::sepolia());
//! let wallet = Address::from_low_u8(0xaa);
//! chain.fund(wallet, 500);
//! let course = chain.add_course("Intro", 99, true);
//! chain.fail_next_reads("hasClaimedNFT", 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use college_types::{Address, Amount, CourseId, ETH_DECIMALS};

use crate::abi::AbiValue;
use crate::client::{
    ChainClient, ChainError, ContractCall, DecodedEvent, Log, LogFilter, Receipt, TxHash, TxStatus,
};
use crate::contracts::{course_fn, nft_fn, token_fn, ContractSet};
use crate::events::{EventAbi, COURSE_PURCHASED, NFT_MINTED};

/// YD minted per whole ETH by `buyTokens`.
pub const MOCK_EXCHANGE_RATE: Amount = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Read,
    Simulate,
    Write,
}

#[derive(Debug, Clone)]
struct MockCourse {
    name: String,
    description: String,
    price: Amount,
    is_active: bool,
}

#[derive(Debug, Clone)]
struct MockPurchase {
    course_id: CourseId,
    timestamp: u64,
    price: Amount,
}

#[derive(Debug, Clone)]
struct MockToken {
    owner: Address,
    course_id: CourseId,
    uri: String,
}

/// Contract state. Cloned for simulations so dry runs never commit.
#[derive(Debug, Clone)]
struct World {
    block: u64,
    now: u64,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    decimals: u8,
    symbol: String,
    courses: Vec<MockCourse>,
    purchases: HashMap<Address, Vec<MockPurchase>>,
    paused: bool,
    claimed: HashSet<(Address, CourseId)>,
    tokens: BTreeMap<u64, MockToken>,
    course_cids: HashMap<CourseId, String>,
}

/// An event produced by execution, before it is stamped into a block.
struct Emitted {
    contract: Address,
    event: EventAbi,
    indexed: Vec<String>,
    args: Vec<(String, AbiValue)>,
}

#[derive(Default)]
struct Faults {
    read_failures: HashMap<String, VecDeque<ChainError>>,
    simulation_overrides: VecDeque<ChainError>,
    write_failures: VecDeque<ChainError>,
    receipt_timeouts: usize,
    suppress_events: bool,
    text_only_reverts: bool,
}

struct Inner {
    world: World,
    faults: Faults,
    calls: Vec<(CallKind, String)>,
    receipts: HashMap<TxHash, Receipt>,
    logs: Vec<Log>,
    tx_counter: u64,
}

/// In-memory [`ChainClient`].
pub struct MockChain {
    contracts: ContractSet,
    inner: Mutex<Inner>,
}

impl MockChain {
    pub fn new(contracts: ContractSet) -> Self {
        Self {
            contracts,
            inner: Mutex::new(Inner {
                world: World {
                    block: 100,
                    now: 1_737_645_845,
                    balances: HashMap::new(),
                    allowances: HashMap::new(),
                    decimals: 0,
                    symbol: "YD".to_string(),
                    courses: Vec::new(),
                    purchases: HashMap::new(),
                    paused: false,
                    claimed: HashSet::new(),
                    tokens: BTreeMap::new(),
                    course_cids: HashMap::new(),
                },
                faults: Faults::default(),
                calls: Vec::new(),
                receipts: HashMap::new(),
                logs: Vec::new(),
                tx_counter: 0,
            }),
        }
    }

    pub fn contracts(&self) -> ContractSet {
        self.contracts
    }

    // ==================== State setup ====================

    pub fn fund(&self, owner: Address, amount: Amount) {
        *self.inner.lock().world.balances.entry(owner).or_default() += amount;
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: Amount) {
        self.inner
            .lock()
            .world
            .allowances
            .insert((owner, spender), amount);
    }

    /// Register a course and return its id (ids start at 1).
    pub fn add_course(&self, name: &str, price: Amount, is_active: bool) -> CourseId {
        let mut inner = self.inner.lock();
        inner.world.courses.push(MockCourse {
            name: name.to_string(),
            description: format!("{} course", name),
            price,
            is_active,
        });
        inner.world.courses.len() as CourseId
    }

    pub fn set_course_active(&self, course_id: CourseId, active: bool) {
        let mut inner = self.inner.lock();
        if let Some(course) = inner.world.courses.get_mut((course_id as usize).wrapping_sub(1)) {
            course.is_active = active;
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.lock().world.paused = paused;
    }

    pub fn set_course_cid(&self, course_id: CourseId, cid: &str) {
        self.inner
            .lock()
            .world
            .course_cids
            .insert(course_id, cid.to_string());
    }

    /// Mark a certificate as claimed without going through `mintNFT`.
    pub fn set_claimed(&self, owner: Address, course_id: CourseId) {
        self.inner.lock().world.claimed.insert((owner, course_id));
    }

    // ==================== Fault injection ====================

    /// Fail the next `n` reads of `function` with a transient transport error.
    pub fn fail_next_reads(&self, function: &str, n: usize) {
        let errors = (0..n).map(|_| ChainError::Transport("connection reset by peer".into()));
        self.fail_next_reads_with(function, errors);
    }

    pub fn fail_next_reads_with(
        &self,
        function: &str,
        errors: impl IntoIterator<Item = ChainError>,
    ) {
        self.inner
            .lock()
            .faults
            .read_failures
            .entry(function.to_string())
            .or_default()
            .extend(errors);
    }

    /// Make the next simulation fail with `err` regardless of state.
    pub fn revert_next_simulation(&self, err: ChainError) {
        self.inner.lock().faults.simulation_overrides.push_back(err);
    }

    /// Make the next write fail with `err` before anything is submitted.
    pub fn fail_next_write(&self, err: ChainError) {
        self.inner.lock().faults.write_failures.push_back(err);
    }

    /// Make the next `n` receipt waits time out. The transactions still land.
    pub fn time_out_next_receipts(&self, n: usize) {
        self.inner.lock().faults.receipt_timeouts += n;
    }

    /// Stop attaching event logs to receipts.
    pub fn suppress_events(&self, suppress: bool) {
        self.inner.lock().faults.suppress_events = suppress;
    }

    /// Report reverts as raw text only, like an RPC without ABI decoding.
    pub fn text_only_reverts(&self, text_only: bool) {
        self.inner.lock().faults.text_only_reverts = text_only;
    }

    // ==================== Inspection ====================

    pub fn balance_of(&self, owner: Address) -> Amount {
        self.inner
            .lock()
            .world
            .balances
            .get(&owner)
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> Amount {
        self.inner
            .lock()
            .world
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn purchase_count(&self, owner: Address) -> usize {
        self.inner
            .lock()
            .world
            .purchases
            .get(&owner)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_claimed(&self, owner: Address, course_id: CourseId) -> bool {
        self.inner.lock().world.claimed.contains(&(owner, course_id))
    }

    /// How many calls of `kind` hit `function`.
    pub fn call_count(&self, kind: CallKind, function: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|(k, f)| *k == kind && f == function)
            .count()
    }

    /// How many calls of `kind` were made in total.
    pub fn total_calls(&self, kind: CallKind) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn reset_call_log(&self) {
        self.inner.lock().calls.clear();
    }

    // ==================== Execution ====================

    fn revert(
        &self,
        text_only: bool,
        function: &str,
        name: &str,
        params: &str,
        args: Vec<AbiValue>,
    ) -> ChainError {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let message = format!(
            "The contract function \"{}\" reverted.\n\nError: {}({})\n                       ({})",
            function,
            name,
            params,
            rendered.join(", ")
        );
        if text_only {
            ChainError::revert_text(message)
        } else {
            ChainError::Revert {
                name: Some(name.to_string()),
                args,
                message,
            }
        }
    }

    fn require_failed(function: &str, reason: &str) -> ChainError {
        ChainError::revert_text(format!(
            "The contract function \"{}\" reverted with the following reason:\n{}",
            function, reason
        ))
    }

    fn arg<'a>(call: &'a ContractCall, index: usize) -> Result<&'a AbiValue, ChainError> {
        call.args.get(index).ok_or_else(|| {
            ChainError::Decode(format!("{}: missing argument {}", call.function, index))
        })
    }

    fn read_world(&self, world: &World, call: &ContractCall, text_only: bool) -> Result<AbiValue, ChainError> {
        let f = call.function.as_str();
        if call.contract == self.contracts.token {
            return match f {
                token_fn::BALANCE_OF => {
                    let owner = Self::arg(call, 0)?.as_address()?;
                    Ok(AbiValue::Uint(world.balances.get(&owner).copied().unwrap_or(0)))
                }
                token_fn::ALLOWANCE => {
                    let owner = Self::arg(call, 0)?.as_address()?;
                    let spender = Self::arg(call, 1)?.as_address()?;
                    Ok(AbiValue::Uint(
                        world.allowances.get(&(owner, spender)).copied().unwrap_or(0),
                    ))
                }
                token_fn::DECIMALS => Ok(AbiValue::Uint(world.decimals as Amount)),
                token_fn::SYMBOL => Ok(AbiValue::String(world.symbol.clone())),
                _ => Err(Self::unknown_function(call)),
            };
        }

        if call.contract == self.contracts.course {
            return match f {
                course_fn::COURSE_COUNT => Ok(AbiValue::Uint(world.courses.len() as Amount)),
                course_fn::GET_COURSE => {
                    let id = Self::arg(call, 0)?.as_u64()?;
                    let course = self.course_at(world, id, f, text_only)?;
                    Ok(AbiValue::Tuple(vec![
                        AbiValue::String(course.name.clone()),
                        AbiValue::Uint(course.price),
                        AbiValue::Bool(course.is_active),
                        AbiValue::String(course.description.clone()),
                    ]))
                }
                course_fn::GET_USER_PURCHASES => {
                    let owner = Self::arg(call, 0)?.as_address()?;
                    let items = world
                        .purchases
                        .get(&owner)
                        .map(|list| {
                            list.iter()
                                .map(|p| {
                                    AbiValue::Tuple(vec![
                                        AbiValue::Uint(p.course_id as Amount),
                                        AbiValue::Uint(p.timestamp as Amount),
                                        AbiValue::Uint(p.price),
                                    ])
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    Ok(AbiValue::Array(items))
                }
                _ => Err(Self::unknown_function(call)),
            };
        }

        if call.contract == self.contracts.nft {
            return match f {
                nft_fn::HAS_CLAIMED_NFT => {
                    let owner = Self::arg(call, 0)?.as_address()?;
                    let course = Self::arg(call, 1)?.as_u64()?;
                    Ok(AbiValue::Bool(world.claimed.contains(&(owner, course))))
                }
                nft_fn::PAUSED => Ok(AbiValue::Bool(world.paused)),
                nft_fn::GET_TOKENS_BY_OWNER => {
                    let owner = Self::arg(call, 0)?.as_address()?;
                    Ok(AbiValue::Array(
                        world
                            .tokens
                            .iter()
                            .filter(|(_, t)| t.owner == owner)
                            .map(|(id, _)| AbiValue::Uint(*id as Amount))
                            .collect(),
                    ))
                }
                nft_fn::TOKEN_URI => {
                    let id = Self::arg(call, 0)?.as_u64()?;
                    let token = Self::token_at(world, id, f)?;
                    Ok(AbiValue::String(token.uri.clone()))
                }
                nft_fn::TOKEN_COURSES => {
                    let id = Self::arg(call, 0)?.as_u64()?;
                    let token = Self::token_at(world, id, f)?;
                    Ok(AbiValue::Uint(token.course_id as Amount))
                }
                nft_fn::TOTAL_SUPPLY => Ok(AbiValue::Uint(world.tokens.len() as Amount)),
                nft_fn::COURSE_CIDS => {
                    let course = Self::arg(call, 0)?.as_u64()?;
                    Ok(AbiValue::String(
                        world.course_cids.get(&course).cloned().unwrap_or_default(),
                    ))
                }
                nft_fn::GET_COURSE_NFT_INFO => {
                    let course = Self::arg(call, 0)?.as_u64()?;
                    let cid = world.course_cids.get(&course).cloned();
                    Ok(AbiValue::Tuple(vec![
                        AbiValue::String(cid.clone().unwrap_or_default()),
                        AbiValue::Uint(Self::minted_for(world, course)),
                        AbiValue::Bool(cid.is_some()),
                    ]))
                }
                nft_fn::COURSE_NFT_COUNT => {
                    let course = Self::arg(call, 0)?.as_u64()?;
                    Ok(AbiValue::Uint(Self::minted_for(world, course)))
                }
                _ => Err(Self::unknown_function(call)),
            };
        }

        Err(ChainError::revert_text(format!(
            "no contract deployed at {}",
            call.contract
        )))
    }

    fn unknown_function(call: &ContractCall) -> ChainError {
        ChainError::revert_text(format!(
            "function \"{}\" not found on {}",
            call.function, call.contract
        ))
    }

    fn minted_for(world: &World, course: CourseId) -> Amount {
        world
            .tokens
            .values()
            .filter(|t| t.course_id == course)
            .count() as Amount
    }

    fn token_at<'a>(world: &'a World, id: u64, function: &str) -> Result<&'a MockToken, ChainError> {
        world
            .tokens
            .get(&id)
            .ok_or_else(|| Self::require_failed(function, "ERC721: invalid token ID"))
    }

    fn course_at<'a>(
        &self,
        world: &'a World,
        id: CourseId,
        function: &str,
        text_only: bool,
    ) -> Result<&'a MockCourse, ChainError> {
        let max = world.courses.len() as CourseId;
        if id == 0 || id > max {
            return Err(self.revert(
                text_only,
                function,
                "InvalidCourseId",
                "uint256 courseId, uint256 maxCourseId",
                vec![AbiValue::Uint(id as Amount), AbiValue::Uint(max as Amount)],
            ));
        }
        Ok(&world.courses[(id - 1) as usize])
    }

    /// Apply a state-changing call to `world`.
    fn execute(
        &self,
        world: &mut World,
        call: &ContractCall,
        caller: Address,
        text_only: bool,
    ) -> Result<Vec<Emitted>, ChainError> {
        let f = call.function.as_str();

        if call.contract == self.contracts.token {
            return match f {
                token_fn::APPROVE => {
                    let spender = Self::arg(call, 0)?.as_address()?;
                    let amount = Self::arg(call, 1)?.as_uint()?;
                    world.allowances.insert((caller, spender), amount);
                    Ok(Vec::new())
                }
                token_fn::BUY_TOKENS => {
                    if call.value == 0 {
                        return Err(Self::require_failed(f, "Must send ETH to buy tokens"));
                    }
                    let minted = call.value * MOCK_EXCHANGE_RATE / 10u128.pow(ETH_DECIMALS);
                    *world.balances.entry(caller).or_default() += minted;
                    Ok(Vec::new())
                }
                _ => Err(Self::unknown_function(call)),
            };
        }

        if call.contract == self.contracts.course && f == course_fn::PURCHASE_COURSE {
            let id = Self::arg(call, 0)?.as_u64()?;
            let course = self.course_at(world, id, f, text_only)?.clone();
            if !course.is_active {
                return Err(self.revert(
                    text_only,
                    f,
                    "CourseNotActive",
                    "uint256 courseId, string name",
                    vec![AbiValue::Uint(id as Amount), AbiValue::String(course.name)],
                ));
            }
            let owned = world
                .purchases
                .get(&caller)
                .map(|list| list.iter().any(|p| p.course_id == id))
                .unwrap_or(false);
            if owned {
                return Err(self.revert(
                    text_only,
                    f,
                    "CourseAlreadyPurchased",
                    "uint256 courseId, address buyer",
                    vec![AbiValue::Uint(id as Amount), AbiValue::Address(caller)],
                ));
            }
            let spender = self.contracts.course;
            let allowance = world
                .allowances
                .get(&(caller, spender))
                .copied()
                .unwrap_or(0);
            if allowance < course.price {
                return Err(self.revert(
                    text_only,
                    f,
                    "InsufficientAllowance",
                    "uint256 required, uint256 actual",
                    vec![AbiValue::Uint(course.price), AbiValue::Uint(allowance)],
                ));
            }
            let balance = world.balances.get(&caller).copied().unwrap_or(0);
            if balance < course.price {
                return Err(self.revert(
                    text_only,
                    f,
                    "InsufficientBalance",
                    "address account, uint256 required, uint256 actual",
                    vec![
                        AbiValue::Address(caller),
                        AbiValue::Uint(course.price),
                        AbiValue::Uint(balance),
                    ],
                ));
            }

            world.balances.insert(caller, balance - course.price);
            world
                .allowances
                .insert((caller, spender), allowance - course.price);
            *world.balances.entry(spender).or_default() += course.price;
            let timestamp = world.now;
            world.purchases.entry(caller).or_default().push(MockPurchase {
                course_id: id,
                timestamp,
                price: course.price,
            });

            return Ok(vec![Emitted {
                contract: spender,
                event: COURSE_PURCHASED,
                indexed: vec![caller.to_hex_literal(), id.to_string()],
                args: vec![
                    ("buyer".to_string(), AbiValue::Address(caller)),
                    ("courseId".to_string(), AbiValue::Uint(id as Amount)),
                    ("price".to_string(), AbiValue::Uint(course.price)),
                ],
            }]);
        }

        if call.contract == self.contracts.nft && f == nft_fn::MINT_NFT {
            let course_id = Self::arg(call, 0)?.as_u64()?;
            let value = Self::arg(call, 1)?.as_uint()?;
            if world.paused {
                return Err(Self::require_failed(f, "Pausable: paused"));
            }
            if value <= 100 {
                return Err(Self::require_failed(f, "value must be greater than 100"));
            }
            if world.claimed.contains(&(caller, course_id)) {
                return Err(Self::require_failed(f, "Already claimed NFT for this course"));
            }
            let token_id = world.tokens.len() as u64 + 1;
            let uri = match world.course_cids.get(&course_id) {
                Some(cid) => format!("ipfs://{}", cid),
                None => format!("ipfs://course-{}", course_id),
            };
            world.tokens.insert(
                token_id,
                MockToken {
                    owner: caller,
                    course_id,
                    uri: uri.clone(),
                },
            );
            world.claimed.insert((caller, course_id));

            return Ok(vec![Emitted {
                contract: self.contracts.nft,
                event: NFT_MINTED,
                indexed: vec![caller.to_hex_literal(), course_id.to_string()],
                args: vec![
                    ("user".to_string(), AbiValue::Address(caller)),
                    ("courseId".to_string(), AbiValue::Uint(course_id as Amount)),
                    ("tokenId".to_string(), AbiValue::Uint(token_id as Amount)),
                    ("tokenURI".to_string(), AbiValue::String(uri)),
                ],
            }]);
        }

        Err(Self::unknown_function(call))
    }

    fn encode_log(emitted: Emitted, block_number: u64, tx_hash: &TxHash) -> Log {
        let mut topics = vec![emitted.event.signature.to_string()];
        topics.extend(emitted.indexed);
        Log {
            address: emitted.contract,
            topics,
            data: serde_json::to_vec(&emitted.args).unwrap_or_default(),
            block_number,
            tx_hash: tx_hash.clone(),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn read(&self, call: &ContractCall) -> Result<AbiValue, ChainError> {
        let mut inner = self.inner.lock();
        inner.calls.push((CallKind::Read, call.function.clone()));
        if let Some(err) = inner
            .faults
            .read_failures
            .get_mut(&call.function)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let text_only = inner.faults.text_only_reverts;
        self.read_world(&inner.world, call, text_only)
    }

    async fn simulate(&self, call: &ContractCall, caller: Address) -> Result<(), ChainError> {
        let mut inner = self.inner.lock();
        inner.calls.push((CallKind::Simulate, call.function.clone()));
        if let Some(err) = inner.faults.simulation_overrides.pop_front() {
            return Err(err);
        }
        let text_only = inner.faults.text_only_reverts;
        let mut scratch = inner.world.clone();
        self.execute(&mut scratch, call, caller, text_only).map(|_| ())
    }

    async fn write(&self, call: &ContractCall, caller: Address) -> Result<TxHash, ChainError> {
        let mut inner = self.inner.lock();
        inner.calls.push((CallKind::Write, call.function.clone()));
        if let Some(err) = inner.faults.write_failures.pop_front() {
            return Err(err);
        }

        let text_only = inner.faults.text_only_reverts;
        let mut world = inner.world.clone();
        let emitted = self.execute(&mut world, call, caller, text_only)?;
        world.block += 1;
        world.now += 12;
        let block_number = world.block;
        inner.world = world;

        inner.tx_counter += 1;
        let tx_hash = TxHash(format!("0x{:064x}", inner.tx_counter));
        let logs: Vec<Log> = if inner.faults.suppress_events {
            Vec::new()
        } else {
            emitted
                .into_iter()
                .map(|e| Self::encode_log(e, block_number, &tx_hash))
                .collect()
        };
        inner.logs.extend(logs.iter().cloned());
        inner.receipts.insert(
            tx_hash.clone(),
            Receipt {
                tx_hash: tx_hash.clone(),
                status: TxStatus::Success,
                block_number,
                logs,
            },
        );
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        _timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        let mut inner = self.inner.lock();
        if inner.faults.receipt_timeouts > 0 {
            inner.faults.receipt_timeouts -= 1;
            return Err(ChainError::ReceiptTimeout {
                tx_hash: tx_hash.clone(),
            });
        }
        inner
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Transport(format!("unknown transaction {}", tx_hash)))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ChainError> {
        let inner = self.inner.lock();
        Ok(inner
            .logs
            .iter()
            .filter(|log| filter.address.map_or(true, |a| a == log.address))
            .filter(|log| {
                filter.event.map_or(true, |e| {
                    log.topics.first().map(String::as_str) == Some(e.signature)
                })
            })
            .filter(|log| filter.from_block.map_or(true, |b| log.block_number >= b))
            .filter(|log| filter.to_block.map_or(true, |b| log.block_number <= b))
            .cloned()
            .collect())
    }

    fn decode_event_log(&self, event: &EventAbi, log: &Log) -> Result<DecodedEvent, ChainError> {
        if log.topics.first().map(String::as_str) != Some(event.signature) {
            return Err(ChainError::Decode(format!("log is not {}", event.name)));
        }
        let args: Vec<(String, AbiValue)> = serde_json::from_slice(&log.data)
            .map_err(|e| ChainError::Decode(format!("{} data: {}", event.name, e)))?;
        Ok(DecodedEvent {
            name: event.name.to_string(),
            args: args.into_iter().collect(),
        })
    }
}
