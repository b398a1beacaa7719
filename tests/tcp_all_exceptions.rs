// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execute this test only if `tcp-server` feature is selected.

#![cfg(feature = "tcp-server")]

mod exception;

use std::{net::SocketAddr, time::Duration};

use exception::check_client_context;
use modbus_core::{client, server::tcp::Server};

use crate::exception::TestService;

#[tokio::test]
async fn all_exceptions() -> Result<(), Box<dyn std::error::Error>> {
    let socket_addr = "127.0.0.1:5502".parse().unwrap();

    tokio::select! {
        r = server_context(socket_addr) => r?,
        () = client_context(socket_addr) => (),
    }

    Ok(())
}

async fn server_context(socket_addr: SocketAddr) -> anyhow::Result<()> {
    println!("Starting up server on {socket_addr}");
    let server = Server::new(socket_addr);
    server.serve(|| Ok(TestService {})).await?;
    Ok(())
}

async fn client_context(socket_addr: SocketAddr) {
    // Give the server some time for starting up
    tokio::time::sleep(Duration::from_millis(100)).await;

    let ctx = client::tcp::connect(socket_addr).await.unwrap();

    check_client_context(ctx).await;
}
