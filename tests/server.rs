use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use layermux::{Middleware, Next, Request, Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const DRAIN_LIMIT: Duration = Duration::from_secs(3);

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), layermux::Error>>,
}

async fn serve(router: Router) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        Server::from_listener(listener)
            .serve_with_shutdown(router, async {
                let _ = stopped.await;
            })
            .await
    });

    Running { addr, stop, task }
}

/// Sends one HTTP/1.1 request with `Connection: close` and returns the raw response.
async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nhost: {addr}\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    raw
}

/// Opens a keep-alive connection and sends one request on it without
/// `connection: close`.
async fn open(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nhost: {addr}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Reads from `stream` until the bytes received so far end with `body`.
async fn read_until(stream: &mut TcpStream, body: &str) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !raw.ends_with(body.as_bytes()) {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed early: {}", String::from_utf8_lossy(&raw));
        raw.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(raw).unwrap()
}

fn app() -> Router {
    let tag = Middleware::from_fn(|req: Request, next: Next| async move {
        let mut res = next.run(req).await;
        res.headers_mut().insert("x-layer", http::HeaderValue::from_static("api"));
        res
    });

    let mut app = Router::new();
    app.use_middleware(layermux::middleware::recover());
    app.group("/api", |api| {
        api.use_middleware(tag);
        api.get("/users/{id}", |req: Request| async move {
            format!("{} {}", req.route_pattern().unwrap_or_default(), req.param("id").unwrap_or_default())
        });
        api.post("/echo", |req: Request| async move { req.body().clone() });
        api.get("/panic", |_req: Request| async move {
            if true {
                panic!("handler blew up");
            }
            "unreachable"
        });
    });
    app
}

#[tokio::test]
async fn serves_routes_over_tcp() {
    let running = serve(app()).await;

    let raw = send(running.addr, "GET", "/api/users/42", "").await;
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.contains("x-layer: api"), "{raw}");
    assert!(raw.ends_with("/api/users/{id} 42"), "{raw}");

    let raw = send(running.addr, "POST", "/api/echo", "ping").await;
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.ends_with("ping"), "{raw}");

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn misses_and_panics_become_status_codes() {
    let running = serve(app()).await;

    let raw = send(running.addr, "GET", "/nowhere", "").await;
    assert!(raw.starts_with("HTTP/1.1 404 Not Found"), "{raw}");

    let raw = send(running.addr, "DELETE", "/api/users/1", "").await;
    assert!(raw.starts_with("HTTP/1.1 405 Method Not Allowed"), "{raw}");
    assert!(raw.contains("allow: GET, HEAD"), "{raw}");

    let raw = send(running.addr, "GET", "/api/panic", "").await;
    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error"), "{raw}");

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[test]
fn bad_bind_address_is_an_error() {
    let err = Server::bind("not an address").err().unwrap();
    assert!(matches!(err, layermux::Error::Addr { .. }), "{err:?}");
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let running = serve(app()).await;

    let mut stream = open(running.addr, "/api/users/7").await;
    let raw = timeout(DRAIN_LIMIT, read_until(&mut stream, "/api/users/{id} 7")).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");

    // The client keeps the connection open and idle across the signal.
    running.stop.send(()).unwrap();
    let served = timeout(DRAIN_LIMIT, running.task).await;
    assert!(served.is_ok(), "serve did not return while a keep-alive connection was idle");
    served.unwrap().unwrap().unwrap();

    let mut rest = Vec::new();
    let n = timeout(DRAIN_LIMIT, stream.read_to_end(&mut rest)).await.unwrap().unwrap();
    assert_eq!(n, 0, "server should close the idle connection");
}

#[tokio::test]
async fn shutdown_lets_in_flight_request_finish() {
    let started = Arc::new(Notify::new());

    let mut app = Router::new();
    {
        let started = Arc::clone(&started);
        app.get("/slow", move |_req: Request| {
            let started = Arc::clone(&started);
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(300)).await;
                "slow done"
            }
        });
    }

    let running = serve(app).await;
    let mut stream = open(running.addr, "/slow").await;

    timeout(DRAIN_LIMIT, started.notified()).await.unwrap();
    running.stop.send(()).unwrap();

    let raw = timeout(DRAIN_LIMIT, read_until(&mut stream, "slow done")).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");

    timeout(DRAIN_LIMIT, running.task).await.unwrap().unwrap().unwrap();
}
