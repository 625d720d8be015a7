// Boots one realm server per test binary and shares its address across tests.
use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Duration,
};

static SERVER_ADDR: OnceLock<SocketAddr> = OnceLock::new();

// Start the server on first use and return its HTTP base URL.
#[allow(dead_code)]
pub fn ensure_server() -> String {
    format!("http://{}", server_addr())
}

// Websocket endpoint of the shared test server.
#[allow(dead_code)]
pub fn ws_url() -> String {
    format!("ws://{}/ws", server_addr())
}

fn server_addr() -> SocketAddr {
    *SERVER_ADDR.get_or_init(|| {
        let published = Arc::new(OnceLock::<SocketAddr>::new());
        let published_by_server = Arc::clone(&published);

        // The server lives on its own thread and runtime so it outlasts each `#[tokio::test]`.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_by_server.set(addr);
                realm_server::run(listener).await.expect("server failed");
            });
        });

        wait_until_accepting(&published)
    })
}

// Block until the server thread has published its address and the socket accepts connections.
fn wait_until_accepting(published: &OnceLock<SocketAddr>) -> SocketAddr {
    let addr = loop {
        if let Some(addr) = published.get() {
            break *addr;
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return addr;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("realm server did not become ready in time");
}
