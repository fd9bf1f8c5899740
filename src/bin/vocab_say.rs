//! vocab-say: command-line client for the vocab-speaker API.

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "vocab-say", about = "Talk to a running vocab-speaker")]
struct Args {
    /// API port
    #[arg(short, long, default_value_t = 8768)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak a word, an Italian/Bengali pair, or an alphabet tile
    Speak {
        /// Text, or the Italian side when --bangla is given
        text: String,
        #[arg(long)]
        bangla: Option<String>,
        /// Treat TEXT as a letter and speak it as an alphabet tile
        #[arg(long, requires = "meaning")]
        word: Option<String>,
        #[arg(long)]
        meaning: Option<String>,
    },
    /// Warm the cache with `italian|||bangla` pairs or plain words
    Prefetch { items: Vec<String> },
    /// Translate Italian <-> Bengali
    Translate {
        text: String,
        /// Also speak the result
        #[arg(long)]
        say: bool,
    },
    /// Show queue, cooldown and playback state
    Status,
    /// Stop playback
    Stop,
}

fn speak_body(text: String, bangla: Option<String>, word: Option<String>, meaning: Option<String>) -> Value {
    match (bangla, word, meaning) {
        (_, Some(word), Some(meaning)) => json!({ "letter": text, "word": word, "meaning": meaning }),
        (Some(bangla), _, _) => json!({ "italian": text, "bangla": bangla }),
        _ => json!({ "text": text }),
    }
}

fn prefetch_item(item: &str) -> Value {
    let parts: Vec<&str> = item.split("|||").collect();
    match parts.as_slice() {
        [letter, word, meaning] => json!({ "letter": letter, "word": word, "meaning": meaning }),
        [italian, bangla] => json!({ "italian": italian, "bangla": bangla }),
        _ => json!({ "text": item }),
    }
}

async fn post(client: &Client, base: &str, path: &str, body: Value) -> Result<Value, reqwest::Error> {
    client
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await?
        .json()
        .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let base = format!("http://127.0.0.1:{}", args.port);

    // Speak waits for synthesis, which can take a while under backoff
    let client = Client::builder()
        .connect_timeout(Duration::from_millis(300))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|_| Client::new());

    let result = match args.command {
        Command::Speak {
            text,
            bangla,
            word,
            meaning,
        } => post(&client, &base, "/speak", speak_body(text, bangla, word, meaning)).await,
        Command::Prefetch { items } => {
            let items: Vec<Value> = items.iter().map(|i| prefetch_item(i)).collect();
            post(&client, &base, "/prefetch", json!({ "items": items })).await
        }
        Command::Translate { text, say } => {
            let translated = post(&client, &base, "/translate", json!({ "text": text })).await;
            match translated {
                Ok(value) if say => {
                    let spoken = value["translation"].as_str().unwrap_or_default().to_string();
                    println!("{spoken}");
                    post(&client, &base, "/speak-translation", json!({ "text": spoken })).await
                }
                other => other,
            }
        }
        Command::Status => match client.get(format!("{base}/status")).send().await {
            Ok(resp) => resp.json().await,
            Err(e) => Err(e),
        },
        Command::Stop => post(&client, &base, "/stop", json!({})).await,
    };

    match result {
        Ok(value) => {
            let failed = value["status"] == "error";
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()));
            if failed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("vocab-speaker API unreachable at {base}: {e}");
            std::process::exit(2);
        }
    }
}
