//! CLI command handling
//!
//! Dispatches CLI commands to the daemon and formats output.

mod connect;

pub use connect::connect_with_retry;

use std::path::PathBuf;
use std::time::Duration;

use crate::commands::{Commands, DirCommands, HistoryCommands, VarCommands};
use crate::common::{config::Config, Error, Result};
use crate::ipc::{Client, PROTOCOL_VERSION};
use crate::store::{Cmd, Dir};

/// Dispatch a client-side CLI command
pub async fn dispatch(config: &Config, sock_path: PathBuf, command: Commands) -> Result<()> {
    let mut client = Client::new(sock_path);
    let version = connect_with_retry(
        &mut client,
        config.client.connect_attempts,
        Duration::from_millis(config.client.connect_delay_ms),
    )
    .await?;

    let result = run_command(&mut client, version, command).await;
    client.close();
    result
}

async fn run_command(client: &mut Client, version: u32, command: Commands) -> Result<()> {
    match command {
        Commands::Daemon { .. } => {
            // Should never happen - daemon mode is handled in main
            unreachable!("Daemon command should be handled in main")
        }

        Commands::Version => {
            println!("{}", version);
            if version != PROTOCOL_VERSION {
                eprintln!(
                    "Warning: this client speaks protocol version {}; restart the daemon",
                    PROTOCOL_VERSION
                );
            }
            Ok(())
        }

        Commands::Pid => {
            println!("{}", client.pid().await?);
            Ok(())
        }

        Commands::Shutdown => {
            client.shutdown().await?;
            println!("Daemon is shutting down");
            Ok(())
        }

        command => {
            if version != PROTOCOL_VERSION {
                return Err(Error::IncompatibleServer {
                    client: PROTOCOL_VERSION,
                    server: version,
                });
            }
            run_store_command(client, command).await
        }
    }
}

async fn run_store_command(client: &mut Client, command: Commands) -> Result<()> {
    match command {
        Commands::Var(var_cmd) => match var_cmd {
            VarCommands::Get { name } => {
                println!("{}", client.shared_var(&name).await?);
                Ok(())
            }

            VarCommands::Set { name, value } => client.set_shared_var(&name, &value).await,

            VarCommands::Del { name } => client.del_shared_var(&name).await,
        },

        Commands::History(hist_cmd) => match hist_cmd {
            HistoryCommands::Add { text } => {
                println!("{}", client.add_cmd(&text).await?);
                Ok(())
            }

            HistoryCommands::List { from, upto } => {
                let upto = match upto {
                    Some(upto) => upto,
                    None => client.next_cmd_seq().await?,
                };
                for cmd in client.cmds(from, upto).await? {
                    print_cmd(&cmd);
                }
                Ok(())
            }

            HistoryCommands::Get { seq } => {
                println!("{}", client.cmd(seq).await?);
                Ok(())
            }

            HistoryCommands::Del { seq } => client.del_cmd(seq).await,

            HistoryCommands::Next { prefix, from } => {
                print_cmd(&client.next_cmd(from, &prefix).await?);
                Ok(())
            }

            HistoryCommands::Prev { prefix, upto } => {
                let upto = match upto {
                    Some(upto) => upto,
                    None => client.next_cmd_seq().await?,
                };
                print_cmd(&client.prev_cmd(upto, &prefix).await?);
                Ok(())
            }
        },

        Commands::Dir(dir_cmd) => match dir_cmd {
            DirCommands::Add { path, weight } => client.add_dir(&path, weight).await,

            DirCommands::List { exclude } => {
                for dir in client.dirs(&exclude).await? {
                    print_dir(&dir);
                }
                Ok(())
            }

            DirCommands::Del { path } => client.del_dir(&path).await,
        },

        Commands::Daemon { .. } | Commands::Version | Commands::Pid | Commands::Shutdown => {
            unreachable!("Server-state commands are handled in run_command")
        }
    }
}

fn print_cmd(cmd: &Cmd) {
    println!("{:>6}  {}", cmd.seq, cmd.text);
}

fn print_dir(dir: &Dir) {
    println!("{:>8.2}  {}", dir.score, dir.path);
}
