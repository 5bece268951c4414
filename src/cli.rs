//! Command line interface of the `subnet-ipam` binary.

use crate::config::Config;
use crate::models::Port;
use crate::output::{print_report, subnet_report};
use crate::service::{Ipam, NetworkUpdate, PortUpdate, SubnetUpdate};
use crate::store::{load_topology, save_topology, MemoryStore};
use clap::{Parser, Subcommand};
use std::error::Error;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "subnet-ipam", version, about = "Subnet and port address management")]
pub struct Cli {
    /// State file, overrides IPAM_STATE_FILE
    #[arg(long, global = true)]
    pub state: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print subnet utilization (default)
    Report,
    /// Create a network
    AddNetwork {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "nova")]
        zone: String,
    },
    /// Rename a network or move it to another zone hint
    RenameNetwork {
        #[arg(long)]
        network: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        zone: Option<String>,
    },
    /// Create a subnet in a network
    AddSubnet {
        #[arg(long)]
        network: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        cidr: String,
    },
    /// Create a port with the next free address of a subnet
    AddPort {
        #[arg(long)]
        subnet: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        mac: Option<String>,
    },
    /// Move a port to another subnet
    MovePort {
        #[arg(long)]
        port: Uuid,
        #[arg(long)]
        subnet: Uuid,
    },
    /// Delete a port
    RemovePort {
        #[arg(long)]
        port: Uuid,
    },
    /// Change the CIDR of a subnet, re-addressing its ports
    SetCidr {
        #[arg(long)]
        subnet: Uuid,
        #[arg(long)]
        cidr: String,
    },
}

fn describe(port: &Port) -> String {
    format!("{} {} {} subnet={}", port.id, port.name, port.ip, port.subnet_id)
}

/// Run one command against the state file and save it if anything changed.
pub fn run(cli: Cli, mut config: Config) -> Result<(), Box<dyn Error>> {
    if let Some(state) = cli.state {
        config.state_file = state;
    }
    let ipam = Ipam::new(load_topology(&config.state_file)?, &config);

    let changed = match cli.command.unwrap_or(Command::Report) {
        Command::Report => {
            print_report(&subnet_report(ipam.store())?);
            false
        }
        Command::AddNetwork { name, zone } => {
            let network = ipam.create_network(&name, &zone)?;
            println!("{} {}", network.id, network);
            true
        }
        Command::RenameNetwork {
            network,
            name,
            zone,
        } => {
            let update = NetworkUpdate {
                name,
                availability_zone_hints: zone,
                ..Default::default()
            };
            let saved = ipam.update_network(network, update)?;
            println!("{} {}", saved.id, saved);
            true
        }
        Command::AddSubnet {
            network,
            name,
            cidr,
        } => {
            let subnet = ipam.create_subnet(&name, &cidr, network)?;
            println!("{} {}", subnet.id, subnet);
            true
        }
        Command::AddPort { subnet, name, mac } => {
            let port = ipam.create_port(&name, mac.as_deref(), subnet)?;
            println!("{}", describe(&port));
            true
        }
        Command::MovePort { port, subnet } => {
            let update = PortUpdate {
                subnet_id: Some(subnet),
                ..Default::default()
            };
            println!("{}", describe(&ipam.update_port(port, update)?));
            true
        }
        Command::RemovePort { port } => {
            let affected = ipam.delete_port(port)?;
            println!("removed {affected} record(s)");
            true
        }
        Command::SetCidr { subnet, cidr } => {
            let update = SubnetUpdate {
                cidr: Some(cidr),
                ..Default::default()
            };
            let saved = ipam.update_subnet(subnet, update)?;
            println!("{} {}", saved.id, saved);
            for port in ipam.list_ports(Some(subnet))? {
                println!("  {}", describe(&port));
            }
            true
        }
    };

    if changed {
        let store: MemoryStore = ipam.into_store();
        save_topology(&store, &config.state_file)?;
    }
    Ok(())
}
