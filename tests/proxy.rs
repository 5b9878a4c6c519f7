/*
 * Copyright 2021 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *       http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use hyper::{
    body::to_bytes,
    service::{make_service_fn, service_fn},
    Body, Client, Method, Response, Server, StatusCode,
};
use tokio::{
    sync::watch,
    time::{sleep, Duration},
};

use swift_addons::{cli::Proxy, Config, Request};

/// A storage proxy with one write-restricted container, `AUTH_test/locked`.
fn spawn_storage() -> SocketAddr {
    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, Infallible>(service_fn(|request: Request| async move {
            let mut response = Response::new(Body::empty());
            match (request.method(), request.uri().path()) {
                (&Method::HEAD, "/v1/AUTH_test/locked") => {
                    *response.status_mut() = StatusCode::NO_CONTENT;
                    response.headers_mut().insert(
                        "x-container-meta-write-restricted",
                        "true".parse().unwrap(),
                    );
                }
                (&Method::HEAD, _) => *response.status_mut() = StatusCode::NOT_FOUND,
                _ => *response.status_mut() = StatusCode::CREATED,
            }
            Ok::<_, Infallible>(response)
        }))
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let address = server.local_addr();
    tokio::spawn(server);
    address
}

fn available_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

async fn put(client: &Client<hyper::client::HttpConnector>, uri: String) -> StatusCode {
    for _ in 0..50 {
        let request = hyper::Request::put(&uri)
            .header("X-Roles", "member")
            .body(Body::empty())
            .unwrap();

        match client.request(request).await {
            Ok(response) => return response.status(),
            // The proxy may not be listening yet.
            Err(_) => sleep(Duration::from_millis(20)).await,
        }
    }

    panic!("proxy never answered");
}

#[tokio::test]
async fn proxy_applies_the_chain() {
    let storage = spawn_storage();
    let listen = available_addr();
    let config = Config::from_reader(
        "
filters:
  - name: swift.filters.write_restriction.v1.WriteRestriction
    config:
      allowed_roles: swiftreseller
"
        .as_bytes(),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let proxy = Proxy {
        listen,
        upstream: format!("http://{storage}").parse().unwrap(),
        reseller_roles: Vec::new(),
    };
    let task = tokio::spawn(proxy.run(Arc::new(config), shutdown_rx));

    let client = Client::new();
    assert_eq!(
        StatusCode::METHOD_NOT_ALLOWED,
        put(&client, format!("http://{listen}/v1/AUTH_test/locked/o")).await
    );
    assert_eq!(
        StatusCode::CREATED,
        put(&client, format!("http://{listen}/v1/AUTH_test/open/o")).await
    );

    let response = client
        .get(format!("http://{listen}/info").parse().unwrap())
        .await
        .unwrap();
    assert_eq!(StatusCode::CREATED, response.status());
    assert!(to_bytes(response.into_body()).await.unwrap().is_empty());

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}
