use reframe_daemon::{guard, ProxyConfig};
use reframe_types::ReframeResult;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

pub async fn run_checks(config_path: &PathBuf, data_dir: &PathBuf, full: bool) -> ReframeResult<()> {
    println!("\x1b[38;5;51mReframe Diagnostics\x1b[0m");
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut warnings = 0;

    print!("[1/5] Configuration:       ");
    std::io::stdout().flush().unwrap();
    let config = if config_path.exists() {
        match ProxyConfig::load(config_path) {
            Ok(config) => {
                println!("\x1b[38;5;46mOK\x1b[0m");
                passed += 1;
                config
            }
            Err(e) => {
                println!("\x1b[38;5;196mFAIL\x1b[0m - {}", e);
                failed += 1;
                ProxyConfig::default()
            }
        }
    } else {
        println!("\x1b[38;5;226mWARN\x1b[0m - Using defaults");
        warnings += 1;
        ProxyConfig::default()
    };

    print!("[2/5] Data Directory:      ");
    std::io::stdout().flush().unwrap();
    if data_dir.exists() && std::fs::metadata(data_dir).map(|m| m.is_dir()).unwrap_or(false) {
        println!("\x1b[38;5;46mOK\x1b[0m");
        passed += 1;
    } else if data_dir.exists() {
        println!("\x1b[38;5;196mFAIL\x1b[0m - Not a directory");
        failed += 1;
    } else {
        println!("\x1b[38;5;226mWARN\x1b[0m - Will be created on start");
        warnings += 1;
    }

    print!("[3/5] Listen Port ({}):  ", config.server.port);
    std::io::stdout().flush().unwrap();
    match std::net::TcpListener::bind(config.socket_addr()) {
        Ok(listener) => {
            drop(listener);
            println!("\x1b[38;5;46mOK\x1b[0m");
            passed += 1;
        }
        Err(_) => {
            println!("\x1b[38;5;226mWARN\x1b[0m - In use (proxy already running?)");
            warnings += 1;
        }
    }

    print!("[4/5] Target Guard:        ");
    std::io::stdout().flush().unwrap();
    let blocks_private = guard::resolve("http://169.254.169.254/", &[]).is_err()
        && guard::resolve("http://127.0.0.1/", &[]).is_err();
    let passes_public = guard::resolve("https://example.com/", &[]).is_ok();
    if blocks_private && passes_public {
        println!("\x1b[38;5;46mOK\x1b[0m");
        passed += 1;
    } else {
        println!("\x1b[38;5;196mFAIL\x1b[0m - Guard self-test failed");
        failed += 1;
    }

    print!("[5/5] Outbound HTTPS:      ");
    std::io::stdout().flush().unwrap();
    if full {
        let probe = tokio::time::timeout(
            Duration::from_secs(5),
            tokio::net::TcpStream::connect("example.com:443"),
        )
        .await;
        match probe {
            Ok(Ok(_)) => {
                println!("\x1b[38;5;46mOK\x1b[0m");
                passed += 1;
            }
            _ => {
                println!("\x1b[38;5;196mFAIL\x1b[0m - Cannot reach example.com:443");
                failed += 1;
            }
        }
    } else {
        println!("\x1b[38;5;245mSKIP\x1b[0m - Use --full to probe");
    }

    println!();
    println!(
        "{} passed, {} failed, {} warnings",
        passed, failed, warnings
    );

    Ok(())
}
