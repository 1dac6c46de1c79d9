//! Integration tests for the routing building blocks working together:
//! pipes, the fair queue and the identity table, without any protocol.

use bytes::Bytes;
use keelson_core::prelude::*;
use keelson_core::fq::FairQueue;
use keelson_core::router::{IdentityGenerator, RouterTable};
use std::collections::HashMap;

#[test]
fn fair_queue_over_inproc_pipes_keeps_messages_whole() {
    let (mut a_local, mut a_remote) = keelson_core::pipe::pair(0);
    let (mut b_local, mut b_remote) = keelson_core::pipe::pair(0);

    a_remote.write(Msg::from_part("a1", true)).unwrap();
    a_remote.write(Msg::from_part("a2", false)).unwrap();
    b_remote.write(Msg::from_part("b1", false)).unwrap();
    a_remote.flush();
    b_remote.flush();

    let mut fq = FairQueue::new();
    fq.attach(a_local.id());
    fq.attach(b_local.id());

    let mut order = Vec::new();
    let ids = (a_local.id(), b_local.id());
    while let Some((_, msg)) = fq.recv(|id| {
        if id == ids.0 {
            a_local.read()
        } else {
            b_local.read()
        }
    }) {
        order.push(msg.data().clone());
    }

    assert_eq!(
        order,
        vec![
            Bytes::from_static(b"a1"),
            Bytes::from_static(b"a2"),
            Bytes::from_static(b"b1"),
        ]
    );
}

#[test]
fn table_routes_to_the_right_pipe() {
    let mut pipes: HashMap<PipeId, InprocPipe> = HashMap::new();
    let mut remotes = Vec::new();
    let mut table = RouterTable::new();
    let mut ids = IdentityGenerator::starting_at(u32::MAX);

    for _ in 0..2 {
        let (local, remote) = keelson_core::pipe::pair(0);
        let identity = ids.generate(|candidate| table.contains(candidate));
        assert!(table.insert(identity, local.id()));
        remotes.push(remote);
        pipes.insert(local.id(), local);
    }

    // Counter wrapped between the two peers.
    let first = Identity::new(Bytes::from_static(&[0, 0xFF, 0xFF, 0xFF, 0xFF]));
    let second = Identity::new(Bytes::from_static(&[0, 0, 0, 0, 0]));
    let route = *table.route(&second).unwrap();

    let pipe = pipes.get_mut(&route.pipe).unwrap();
    assert!(pipe.check_write());
    pipe.write(Msg::from_part("hi", false)).unwrap();
    pipe.flush();

    assert!(remotes[0].read().is_none());
    assert_eq!(remotes[1].read().unwrap().data().as_ref(), b"hi");
    assert!(table.contains(&first));
}

#[test]
fn options_feed_pipe_high_water_mark() {
    let opts = SocketOptions::new(SocketType::Router).with_hwm(1);
    let (mut local, _remote) = keelson_core::pipe::pair(opts.hwm);
    local.write(Msg::from_part("1", false)).unwrap();
    assert!(!local.check_write());
    assert!(local.write(Msg::from_part("2", false)).is_err());
    local.rollback();
    assert!(local.check_write());
}
