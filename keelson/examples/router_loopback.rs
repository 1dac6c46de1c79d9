//! ROUTER and DEALER engines talking over TCP loopback, single-threaded.
//!
//! Run with: `RUST_LOG=debug cargo run --example router_loopback`
//!
//! A real application would use a poller; here both engines are simply
//! given every event they asked for until the exchange is done.

use keelson::dev_tracing::init_tracing;
use keelson::zmq::prelude::*;
use keelson::zmq::{create_monitor, SocketEvent};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

type TcpEngine = ZmtpEngine<TcpStream, Interest, PipeSession>;

fn drive(engine: &mut TcpEngine) {
    if engine.registrar().wants_write() {
        engine.out_event();
    }
    if engine.registrar().wants_read() {
        engine.in_event();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let dealer_opts = SocketOptions::new(SocketType::Dealer).with_identity(&b"worker-1"[..]);
    let router_opts = SocketOptions::new(SocketType::Router);

    let client = TcpStream::connect(addr)?;
    let (server, peer_addr) = listener.accept()?;
    prepare_stream(&client, &dealer_opts)?;
    prepare_stream(&server, &router_opts)?;

    // Router side: engine + pipe attached to the ROUTER.
    let (engine_end, router_end) = pipe::pair(router_opts.hwm);
    let (monitor_tx, monitor) = create_monitor();
    let mut server_engine = ZmtpEngine::new(server, Interest::new(), router_opts.clone(), format!("tcp://{peer_addr}"))
        .with_monitor(monitor_tx);
    server_engine.plug(PipeSession::new(engine_end));
    let mut router: RouterSocket<InprocPipe> = RouterSocket::new(&router_opts);
    let peer = router.attach(router_end);

    // Dealer side: engine + the pipe end the application uses directly.
    let (engine_end, mut dealer) = pipe::pair(dealer_opts.hwm);
    let mut client_engine = ZmtpEngine::new(client, Interest::new(), dealer_opts, format!("tcp://{addr}"));
    client_engine.plug(PipeSession::new(engine_end));

    dealer.write(Msg::from_part("hello", false)).ok();
    dealer.flush();
    client_engine.restart_output();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut replied = false;
    while Instant::now() < deadline {
        drive(&mut client_engine);
        drive(&mut server_engine);
        router.read_activated(peer);

        if !replied && router.has_in() {
            let (Some(from), Some(body)) = (router.recv(), router.recv()) else {
                continue;
            };
            println!("ROUTER got {:?} from {:?}", body.data(), from.data());

            router.send(from)?;
            router.send(Msg::from_part("world", false))?;
            server_engine.restart_output();
            replied = true;
        }

        if let Some(reply) = dealer.read() {
            println!("DEALER got {:?}", reply.data());
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    for event in monitor.drain() {
        if let SocketEvent::HandshakeSucceeded { .. } = event {
            println!("monitor: {event}");
        }
    }
    Ok(())
}
