//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod api;
mod cli;
mod config;
mod logging;

use clap::Parser;
use cli::Cli;
use config::Config;
use ospfprobe_core::interface::InterfaceConfig;
use ospfprobe_core::lsdb;
use tracing::{error, info};

fn resolve_ifindex(name: &str) -> Option<u32> {
    nix::net::if_::if_nametoindex(name).ok()
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(error.exit_code());
        }
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }

    if cli.validate_config {
        println!("configuration is valid");
        return;
    }

    let _logging_guard = logging::init(&config.logging);
    info!(router_id = %config.router_id, interface = %config.interface_name, "starting up");

    let Some(ifindex) = resolve_ifindex(&config.interface_name) else {
        error!(interface = %config.interface_name, "interface not found");
        std::process::exit(6);
    };

    let options = match config.parsed_options() {
        Ok(options) => options,
        Err(error) => {
            error!(%error, "illegal options");
            std::process::exit(5);
        }
    };

    let iface_config = InterfaceConfig {
        name: config.interface_name.clone(),
        router_id: config.router_id,
        area_id: config.area,
        address: config.ip,
        netmask: config.mask,
        mtu: config.mtu,
        link_type: config.link_type.into(),
        hello_interval: config.hello_interval,
        rxmt_interval: config.rxmt_interval,
        options,
    };

    let packet_display = config.packet_display;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(run(config, iface_config, ifindex, packet_display));
}

async fn run(config: Config, iface_config: InterfaceConfig, ifindex: u32, packet_display: bool) {
    let (lsdb_handle, _lsdb_task) = lsdb::spawn();

    let (instance, instance_task) = match ospfprobe_core::instance::spawn(
        iface_config,
        ifindex,
        lsdb_handle,
        packet_display,
    ) {
        Ok(result) => result,
        Err(error) => {
            error.log();
            std::process::exit(1);
        }
    };

    let app = api::router(instance.clone(), &config.query);
    let bind_addr = format!("{}:{}", config.query.bind_host, config.query.bind_port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%error, address = %bind_addr, "failed to bind query surface");
            std::process::exit(1);
        }
    };
    info!(address = %bind_addr, "query surface listening");

    let server = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            error!(%error, "query surface terminated");
        }
    });

    wait_for_shutdown_signal().await;
    info!("shutting down");

    instance.shutdown().await;
    let _ = instance_task.await;
    server.abort();

    std::process::exit(0);
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
