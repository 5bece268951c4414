//! Subnet utilization report.

use super::terminal::{color_available, format_field, format_ranges};
use crate::error::Result;
use crate::processing::{compute_ips, RangeInfo};
use crate::store::TopologyStore;
use colored::Colorize;
use itertools::Itertools;
use std::collections::HashMap;

/// Row of the utilization report.
#[derive(Debug, Clone)]
pub struct SubnetReportRow {
    pub network_name: String,
    pub subnet_name: String,
    pub subnet_cidr: String,
    pub ports: usize,
    pub usage: RangeInfo,
}

/// Build one row per subnet, ordered by network name then CIDR.
pub fn subnet_report<S: TopologyStore + ?Sized>(store: &S) -> Result<Vec<SubnetReportRow>> {
    let networks: HashMap<_, _> = store
        .list_networks()?
        .into_iter()
        .map(|n| (n.id, n.name))
        .collect();
    let ports_by_subnet = store
        .list_ports(None)?
        .into_iter()
        .into_group_map_by(|p| p.subnet_id);

    let rows = store
        .list_subnets(None)?
        .into_iter()
        .sorted_by_key(|s| {
            (
                networks.get(&s.network_id).cloned().unwrap_or_default(),
                s.cidr.lo(),
                s.cidr.mask(),
            )
        })
        .map(|s| {
            let ports = ports_by_subnet.get(&s.id).map(Vec::as_slice).unwrap_or(&[]);
            SubnetReportRow {
                network_name: networks
                    .get(&s.network_id)
                    .cloned()
                    .unwrap_or_else(|| "None".to_string()),
                subnet_name: s.name.clone(),
                subnet_cidr: s.cidr.to_string(),
                ports: ports.len(),
                usage: compute_ips(&s.cidr, ports.iter().map(|p| p.ip.as_str())),
            }
        })
        .collect();
    Ok(rows)
}

/// Header and rows of the report, uncoloured.
pub fn report_lines(rows: &[SubnetReportRow]) -> Vec<String> {
    let mut lines = vec![format!(
        "{},{},{},{},{},{},{},{}",
        format_field("network", 16),
        format_field("subnet", 16),
        format_field("cidr", 20),
        format_field("netmask", 17),
        format_field("total", 10),
        format_field("used", 8),
        format_field("available", 11),
        format_field("free_ranges", 13),
    )];
    lines.extend(rows.iter().map(|row| {
        format!(
            "{},{},{},{},{},{},{},{}",
            format_field(&row.network_name, 16),
            format_field(&row.subnet_name, 16),
            format_field(&row.subnet_cidr, 20),
            format_field(&row.usage.netmask, 17),
            format_field(row.usage.total, 10),
            format_field(row.ports, 8),
            format_field(row.usage.available, 11),
            format_field(format_ranges(&row.usage.ips), 13),
        )
    }));
    lines
}

/// Print the report to stdout, highlighting subnets that are running out.
pub fn print_report(rows: &[SubnetReportRow]) {
    log::info!("#Start print_report() for {} subnet(s)", rows.len());
    for (line, row) in report_lines(rows)
        .into_iter()
        .zip(std::iter::once(None).chain(rows.iter().map(Some)))
    {
        match row {
            Some(row) => println!(
                "{}",
                color_available(line, row.usage.available, row.usage.total)
            ),
            None => println!("{}", line.bold()),
        }
    }
    println!(
        "#{}# {} subnet(s), generated {}",
        "NOTE".on_blue(),
        rows.len(),
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
}
