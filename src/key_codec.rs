//! Pure, total functions that mint and parse the textual keys shared across
//! the object store, cache store, and state store. All coordination flows
//! through these keys, so parsing is strict: a malformed key is a programmer
//! error (we panic), not a runtime condition to recover from.
//!
//! The original `spdb` source built these with ad-hoc `"...".format(...)`
//! calls scattered across `state.py`. Per the design note in spec.md §9 this
//! is reimplemented as a structured [`CuboidAddress`] value type with every
//! string routed through this module, so the trim/split invariants can be
//! unit-tested in isolation.

const DELIM: char = '&';

const CACHED_CUBOID: &str = "CACHED-CUBOID";
const WRITE_CUBOID: &str = "WRITE-CUBOID";
const PAGE_IN_CHANNEL: &str = "PAGE-IN-CHANNEL";
const PAGE_OUT: &str = "PAGE-OUT";
const DELAYED_WRITE: &str = "DELAYED-WRITE";
const RESOURCE_DELAYED_WRITE: &str = "RESOURCE-DELAYED-WRITE";
const CACHE_MISS: &str = "CACHE-MISS";
const WRITE_LOCK: &str = "WRITE-LOCK";

/// The coordinates that identify a single cuboid within one channel/layer:
/// `(lookup_key, resolution, time_sample, morton)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CuboidAddress {
    pub lookup_key: String,
    pub resolution: u32,
    pub time_sample: u64,
    pub morton: u64,
}

impl CuboidAddress {
    pub fn new(lookup_key: impl Into<String>, resolution: u32, time_sample: u64, morton: u64) -> Self {
        Self {
            lookup_key: lookup_key.into(),
            resolution,
            time_sample,
            morton,
        }
    }
}

/// Mint a resource's numeric `<coll_id>&<exp_id>&<chan_id>` id triple: the
/// stable key used in every state-store key in this crate.
pub fn lookup_key(collection_id: u64, experiment_id: u64, channel_id: u64) -> String {
    format!("{collection_id}{DELIM}{experiment_id}{DELIM}{channel_id}")
}

/// Mint a resource's human-readable `collection&experiment&channel` name
/// triple.
pub fn boss_key(collection_name: &str, experiment_name: &str, channel_or_layer_name: &str) -> String {
    format!("{collection_name}{DELIM}{experiment_name}{DELIM}{channel_or_layer_name}")
}

/// Mint the `CACHED-CUBOID&<lookup>&<res>&<t>&<morton>` key.
pub fn cached_cuboid_key(addr: &CuboidAddress) -> String {
    format!(
        "{CACHED_CUBOID}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        addr.lookup_key, addr.resolution, addr.time_sample, addr.morton
    )
}

/// Mint the `WRITE-CUBOID&<lookup>&<res>&<t>&<morton>&<uuid>` key for a fresh
/// staged write attempt.
pub fn write_cuboid_key(addr: &CuboidAddress, uuid: &uuid::Uuid) -> String {
    format!(
        "{WRITE_CUBOID}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        addr.lookup_key, addr.resolution, addr.time_sample, addr.morton, uuid
    )
}

/// Parse a write-cuboid key back into its address and uuid suffix.
///
/// # Panics
/// Panics if `key` is not a well-formed write-cuboid key: a malformed key
/// here means a different subsystem minted something it shouldn't have.
pub fn parse_write_cuboid_key(key: &str) -> (CuboidAddress, uuid::Uuid) {
    let rest = key
        .strip_prefix(WRITE_CUBOID)
        .and_then(|s| s.strip_prefix(DELIM))
        .unwrap_or_else(|| panic!("not a write-cuboid key: {key}"));
    // `lookup_key` is itself `&`-joined (collection&experiment&channel), so a
    // naive fixed-width split breaks; take the four trailing fields off the
    // right and treat everything before them as the (possibly multi-part)
    // lookup key.
    let parts: Vec<&str> = rest.split(DELIM).collect();
    assert!(parts.len() >= 5, "malformed write-cuboid key: {key}");
    let n = parts.len();
    let lookup_key = parts[..n - 4].join(&DELIM.to_string());
    let addr = CuboidAddress::new(
        lookup_key,
        parts[n - 4].parse().expect("resolution must be an integer"),
        parts[n - 3].parse().expect("time_sample must be an integer"),
        parts[n - 2].parse().expect("morton must be an integer"),
    );
    let id = parts[n - 1].parse().expect("uuid suffix must be a valid uuid");
    (addr, id)
}

/// Mint a fresh ephemeral page-in pub/sub channel name.
pub fn page_in_channel_name(uuid: &uuid::Uuid) -> String {
    format!("{PAGE_IN_CHANNEL}{DELIM}{}", uuid.simple())
}

/// Mint the `PAGE-OUT&<lookup>&<res>` set key.
pub fn page_out_key(lookup_key: &str, resolution: u32) -> String {
    format!("{PAGE_OUT}{DELIM}{lookup_key}{DELIM}{resolution}")
}

/// The `"<time>&<morton>"` member stored inside a page-out set. Per spec.md
/// §9, the newer pipeline-transactional convention orders time before morton.
pub fn page_out_member(time_sample: u64, morton: u64) -> String {
    format!("{time_sample}{DELIM}{morton}")
}

/// Mint the `DELAYED-WRITE&<lookup>&<res>&<t>&<morton>` list key.
pub fn delayed_write_key(addr: &CuboidAddress) -> String {
    format!(
        "{DELAYED_WRITE}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        addr.lookup_key, addr.resolution, addr.time_sample, addr.morton
    )
}

/// Strip the leading `WRITE-CUBOID` token and the trailing `&<uuid>` from a
/// write-cuboid key, and prepend `DELAYED-WRITE`, yielding
/// `DELAYED-WRITE&<lookup>&<res>&<t>&<morton>`.
///
/// Both trims operate on the first/last `&` respectively, so embedded `&` in
/// identifiers (there are none in this key shape, but the rule is what keeps
/// this function correct if that ever changes) never confuses the parse.
pub fn write_cuboid_to_delayed(key: &str) -> String {
    let after_prefix = key
        .strip_prefix(WRITE_CUBOID)
        .and_then(|s| s.strip_prefix(DELIM))
        .unwrap_or_else(|| panic!("not a write-cuboid key: {key}"));
    let last_delim = after_prefix
        .rfind(DELIM)
        .unwrap_or_else(|| panic!("write-cuboid key missing uuid suffix: {key}"));
    let body = &after_prefix[..last_delim];
    format!("{DELAYED_WRITE}{DELIM}{body}")
}

/// Mint the `RESOURCE-DELAYED-WRITE&<lookup>&<res>&<t>&<morton>&<uuid>` key
/// paired 1:1 with one enqueued write-cuboid key (versioned per SPEC_FULL.md
/// §9 item 2, so a racing producer's later enqueue can never collide with the
/// resource key a drainer is mid-pop on).
pub fn resource_delayed_write_key(addr: &CuboidAddress, uuid: &uuid::Uuid) -> String {
    format!(
        "{RESOURCE_DELAYED_WRITE}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        addr.lookup_key, addr.resolution, addr.time_sample, addr.morton, uuid
    )
}

/// The `CACHE-MISS` global list key.
pub fn cache_miss_key() -> &'static str {
    CACHE_MISS
}

/// Mint the `WRITE-LOCK&<lookup>` key.
pub fn write_lock_key(lookup_key: &str) -> String {
    format!("{WRITE_LOCK}{DELIM}{lookup_key}")
}

/// Glob pattern matching every delayed-write queue key, for `list_queues`.
pub fn delayed_write_scan_pattern() -> String {
    format!("{DELAYED_WRITE}{DELIM}*")
}
