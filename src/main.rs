pub mod peer;
pub mod server;

use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("serve") => {
            let addr = args.get(2).map(String::as_str).unwrap_or("0.0.0.0:3000");
            println!("Starting signaling server on {addr}...");
            server::main(addr)
        }
        Some("peer") => match args.get(2) {
            Some(url) => {
                println!("Starting offering peer against {url}...");
                peer::main(url.clone())
            }
            None => {
                print_usage();
                return;
            }
        },
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error:\n{e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("RTC Signal");
    println!("Usage:");
    println!("  rtc-signal serve [http-addr]  - Answer offers posted over HTTP");
    println!("  rtc-signal peer <server-url>  - Offer to a running server");
}
