use serde::{Deserialize, Serialize};
use stake_post::{
    Amount, Clock, EventLog, Identity, InMemoryVault, LedgerConfig, LedgerSnapshot, ManualClock,
    PostReference, Slot, StakePost, SystemClock, Timestamp,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type CliLedger = StakePost<ManualClock, InMemoryVault, EventLog>;

#[derive(Serialize, Deserialize)]
struct StateFile {
    ledger: LedgerSnapshot,
    vault: InMemoryVault,
    /// Latest time any command ran at; later commands never start earlier.
    #[serde(default)]
    last_seen: Timestamp,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        std::process::exit(1);
    };
    let tail: Vec<String> = args.collect();
    if tail.iter().any(|a| a == "-h" || a == "--help") {
        print_command_help(&command);
        return;
    }
    match command.as_str() {
        "-h" | "--help" | "help" => print_help(),
        "init" => cmd_init(tail),
        "fund" => cmd_fund(tail),
        "stake" => cmd_stake(tail),
        "exit" => cmd_exit(tail),
        "set-fee" => cmd_set_fee(tail),
        "set-collector" => cmd_set_collector(tail),
        "transfer-owner" => cmd_transfer_owner(tail),
        "lookup" => cmd_lookup(tail),
        "show" => cmd_show(tail),
        "root" => cmd_root(tail),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "stakepost <command> [options]\n\
         \n\
         Commands:\n\
         \x20 init            --state <file> --owner <id> [--config <file>]\n\
         \x20 fund            --state <file> --account <id> --amount <N>\n\
         \x20 stake           --state <file> --from <id> --post <hash> --amount <N> [--now <secs>]\n\
         \x20 exit            --state <file> --from <id> [--now <secs>]\n\
         \x20 set-fee         --state <file> --from <id> --rate <bps>\n\
         \x20 set-collector   --state <file> --from <id> --collector <id>\n\
         \x20 transfer-owner  --state <file> --from <id> --owner <id>\n\
         \x20 lookup          --state <file> --user <id>\n\
         \x20 show            --state <file>\n\
         \x20 root            --state <file>\n\
         \n\
         Log verbosity follows RUST_LOG (default: info)."
    );
}

fn print_command_help(command: &str) {
    let usage = match command {
        "init" => "stakepost init --state <file> --owner <id> [--config <file>]",
        "fund" => "stakepost fund --state <file> --account <id> --amount <N>",
        "stake" => {
            "stakepost stake --state <file> --from <id> --post <hash> --amount <N> [--now <secs>]"
        }
        "exit" => "stakepost exit --state <file> --from <id> [--now <secs>]",
        "set-fee" => "stakepost set-fee --state <file> --from <id> --rate <bps>",
        "set-collector" => "stakepost set-collector --state <file> --from <id> --collector <id>",
        "transfer-owner" => "stakepost transfer-owner --state <file> --from <id> --owner <id>",
        "lookup" => "stakepost lookup --state <file> --user <id>",
        "show" => "stakepost show --state <file>",
        "root" => "stakepost root --state <file>",
        _ => {
            print_help();
            return;
        }
    };
    println!("Usage: {usage}");
}

fn fatal(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

/// Flag values collected from a command tail.
#[derive(Default)]
struct Flags {
    state: Option<PathBuf>,
    values: Vec<(String, String)>,
}

impl Flags {
    fn parse(args: Vec<String>, allowed: &[&str]) -> Self {
        let mut flags = Flags::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let name = arg.as_str();
            if name == "--state" {
                flags.state = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--state expects a value")),
                ));
            } else if allowed.contains(&name) {
                let value = iter
                    .next()
                    .unwrap_or_else(|| fatal(&format!("{name} expects a value")));
                flags.values.push((arg, value));
            } else {
                fatal(&format!("unknown argument: {name}"));
            }
        }
        flags
    }

    fn state(&self) -> &Path {
        self.state
            .as_deref()
            .unwrap_or_else(|| fatal("--state is required"))
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| value.as_str())
    }

    fn require(&self, name: &str) -> &str {
        self.get(name)
            .unwrap_or_else(|| fatal(&format!("{name} is required")))
    }

    fn identity(&self, name: &str) -> Identity {
        self.require(name)
            .parse()
            .unwrap_or_else(|err| fatal(&format!("invalid {name}: {err}")))
    }

    fn amount(&self, name: &str) -> Amount {
        self.require(name)
            .parse()
            .unwrap_or_else(|_| fatal(&format!("invalid {name}")))
    }

    fn now(&self) -> Option<Timestamp> {
        self.get("--now").map(|raw| {
            raw.parse()
                .unwrap_or_else(|_| fatal("invalid --now"))
        })
    }
}

fn load_state(path: &Path) -> StateFile {
    let bytes = fs::read(path)
        .unwrap_or_else(|err| fatal(&format!("failed to read state {}: {err}", path.display())));
    let state: StateFile = serde_json::from_slice(&bytes)
        .unwrap_or_else(|err| fatal(&format!("failed to decode state {}: {err}", path.display())));
    state
        .ledger
        .validate()
        .unwrap_or_else(|err| fatal(&format!("invalid state {}: {err}", path.display())));
    state
}

fn save_state(path: &Path, state: &StateFile) {
    let bytes = serde_json::to_vec_pretty(state)
        .unwrap_or_else(|err| fatal(&format!("failed to encode state: {err}")));
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)
        .and_then(|_| fs::rename(&tmp_path, path))
        .unwrap_or_else(|err| fatal(&format!("failed to save state {}: {err}", path.display())));
}

fn open_ledger(path: &Path, now: Option<Timestamp>) -> CliLedger {
    let StateFile {
        ledger,
        vault,
        last_seen,
    } = load_state(path);
    let last_seen = last_seen.max(ledger.latest_timestamp());
    let clock = ManualClock::resume(last_seen, now)
        .unwrap_or_else(|err| fatal(&format!("invalid --now: {err}")));
    StakePost::from_snapshot(ledger, clock, vault, EventLog::new())
        .unwrap_or_else(|err| fatal(&format!("failed to restore ledger: {err}")))
}

/// Prints the notifications raised by the last call and persists the ledger.
fn commit(path: &Path, ledger: CliLedger) {
    let (snapshot, clock, vault, mut log) = ledger.into_parts();
    for event in log.drain() {
        let json = serde_json::to_string(&event)
            .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        println!("QSYS|mod=LEDGER|evt={}|json={json}", event.tag());
    }
    save_state(
        path,
        &StateFile {
            ledger: snapshot,
            vault,
            last_seen: clock.now(),
        },
    );
}

fn cmd_init(args: Vec<String>) {
    let flags = Flags::parse(args, &["--owner", "--config"]);
    let path = flags.state();
    if path.exists() {
        fatal(&format!("state {} already exists", path.display()));
    }
    let owner = flags.identity("--owner");
    let config = match flags.get("--config") {
        Some(file) => LedgerConfig::load(Path::new(file))
            .unwrap_or_else(|err| fatal(&format!("failed to load config {file}: {err}"))),
        None => LedgerConfig::default(),
    }
    .with_env()
    .unwrap_or_else(|err| fatal(&err.to_string()));
    let ledger = StakePost::new(
        owner,
        config,
        ManualClock::new(SystemClock::new().now()),
        InMemoryVault::new(),
        EventLog::new(),
    )
    .unwrap_or_else(|err| fatal(&err.to_string()));
    commit(path, ledger);
    println!(
        "QSYS|mod=CLI|evt=INIT|owner={owner}|hold_period_secs={}|state={}",
        config.hold_period_secs,
        path.display()
    );
}

fn cmd_fund(args: Vec<String>) {
    let flags = Flags::parse(args, &["--account", "--amount"]);
    let path = flags.state();
    let account = flags.identity("--account");
    let amount = flags.amount("--amount");
    let mut ledger = open_ledger(path, None);
    ledger
        .vault_mut()
        .fund(account, amount)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    let balance = ledger.vault().balance_of(&account);
    commit(path, ledger);
    println!("QSYS|mod=CLI|evt=FUND|account={account}|amount={amount}|balance={balance}");
}

fn cmd_stake(args: Vec<String>) {
    let flags = Flags::parse(args, &["--from", "--post", "--amount", "--now"]);
    let path = flags.state();
    let participant = flags.identity("--from");
    let reference: PostReference = flags
        .require("--post")
        .parse()
        .unwrap_or_else(|err| fatal(&format!("invalid --post: {err}")));
    let amount = flags.amount("--amount");
    let mut ledger = open_ledger(path, flags.now());
    let slot = ledger
        .stake_and_post(participant, reference, amount)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    let unlocks_at = ledger.unlocks_at(&participant).unwrap_or_default();
    commit(path, ledger);
    println!("QSYS|mod=CLI|evt=STAKE|slot={slot}|unlocks_at={unlocks_at}");
}

fn cmd_exit(args: Vec<String>) {
    let flags = Flags::parse(args, &["--from", "--now"]);
    let path = flags.state();
    let participant = flags.identity("--from");
    let mut ledger = open_ledger(path, flags.now());
    let quote = ledger
        .exit(&participant)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    commit(path, ledger);
    println!(
        "QSYS|mod=CLI|evt=EXIT|slot={}|payout={}|fee={}|collector={}",
        quote.slot, quote.payout, quote.fee, quote.collector
    );
}

fn cmd_set_fee(args: Vec<String>) {
    let flags = Flags::parse(args, &["--from", "--rate"]);
    let path = flags.state();
    let caller = flags.identity("--from");
    let rate: u32 = flags
        .require("--rate")
        .parse()
        .unwrap_or_else(|_| fatal("invalid --rate"));
    let mut ledger = open_ledger(path, None);
    ledger
        .set_fee_rate(&caller, rate)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    commit(path, ledger);
}

fn cmd_set_collector(args: Vec<String>) {
    let flags = Flags::parse(args, &["--from", "--collector"]);
    let path = flags.state();
    let caller = flags.identity("--from");
    let collector = flags.identity("--collector");
    let mut ledger = open_ledger(path, None);
    ledger
        .set_fee_collector(&caller, collector)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    commit(path, ledger);
}

fn cmd_transfer_owner(args: Vec<String>) {
    let flags = Flags::parse(args, &["--from", "--owner"]);
    let path = flags.state();
    let caller = flags.identity("--from");
    let owner = flags.identity("--owner");
    let mut ledger = open_ledger(path, None);
    ledger
        .transfer_ownership(&caller, owner)
        .unwrap_or_else(|err| fatal(&err.to_string()));
    commit(path, ledger);
}

fn cmd_lookup(args: Vec<String>) {
    let flags = Flags::parse(args, &["--user"]);
    let user = flags.identity("--user");
    let ledger = open_ledger(flags.state(), None);
    let slot = ledger.get_index_by_user(&user);
    println!("{}", Slot::signed(slot));
}

fn cmd_show(args: Vec<String>) {
    let flags = Flags::parse(args, &[]);
    let state = load_state(flags.state());
    let pretty = serde_json::to_string_pretty(&state)
        .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
    println!("{pretty}");
}

fn cmd_root(args: Vec<String>) {
    let flags = Flags::parse(args, &[]);
    let state = load_state(flags.state());
    println!("{}", hex::encode(state.ledger.state_root()));
}
