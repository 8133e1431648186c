use super::*;

fn fast_group(size: usize) -> LocalGroup {
    LocalGroup::with_opts(size, &LocalGroupOpts { recv_timeout_ms: 200 }).unwrap()
}

#[test]
fn zero_ranks_is_configuration_error() {
    assert!(matches!(
        LocalGroup::new(0),
        Err(SortlastError::Configuration(_))
    ));
}

#[test]
fn endpoints_know_rank_and_size() {
    let group = LocalGroup::new(3).unwrap();
    assert_eq!(group.size(), 3);
    let ranks: Vec<_> = group
        .into_endpoints()
        .iter()
        .map(|c| (c.rank(), c.size()))
        .collect();
    assert_eq!(ranks, vec![(0, 3), (1, 3), (2, 3)]);
}

#[test]
fn messages_between_a_pair_stay_in_order() {
    let tag = MessageTag::new(MessageTag::USER, 0);
    let results = LocalGroup::new(2).unwrap().run(|comm| {
        if comm.rank() == 0 {
            for i in 0..5u8 {
                comm.send(1, tag, vec![i]).unwrap();
            }
            Vec::new()
        } else {
            (0..5).map(|_| comm.recv(0, tag).unwrap()[0]).collect()
        }
    });
    assert_eq!(results[1], vec![0, 1, 2, 3, 4]);
}

#[test]
fn send_to_self_is_delivered() {
    let tag = MessageTag::new(MessageTag::USER, 3);
    let comm = LocalGroup::new(1).unwrap().into_endpoints().remove(0);
    comm.send(0, tag, vec![42]).unwrap();
    assert_eq!(comm.recv(0, tag).unwrap(), vec![42]);
}

#[test]
fn tag_mismatch_is_collective_error() {
    let results = fast_group(2).run(|comm| {
        if comm.rank() == 0 {
            comm.send(1, MessageTag::new(MessageTag::COMPOSITE, 1), vec![1])
                .map(|_| ())
        } else {
            comm.recv(0, MessageTag::new(MessageTag::COMPOSITE, 2))
                .map(|_| ())
        }
    });
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(matches!(err, SortlastError::Collective(_)));
    assert!(err.is_fatal_for_group());
}

#[test]
fn missing_message_times_out() {
    let comm = LocalGroup::with_opts(1, &LocalGroupOpts { recv_timeout_ms: 20 })
        .unwrap()
        .into_endpoints()
        .remove(0);
    let err = comm
        .recv(0, MessageTag::new(MessageTag::USER, 0))
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn departed_peer_is_reported() {
    let mut endpoints = fast_group(2).into_endpoints();
    let survivor = endpoints.remove(0);
    drop(endpoints);
    let err = survivor
        .recv(1, MessageTag::new(MessageTag::USER, 0))
        .unwrap_err();
    assert!(err.to_string().contains("left the group"));
    assert!(matches!(
        survivor.send(1, MessageTag::new(MessageTag::USER, 0), Vec::new()),
        Err(SortlastError::Collective(_))
    ));
}

#[test]
fn out_of_range_peer_is_rejected() {
    let comm = LocalGroup::new(1).unwrap().into_endpoints().remove(0);
    assert!(comm.send(1, MessageTag::new(MessageTag::USER, 0), Vec::new()).is_err());
    assert!(comm.recv(3, MessageTag::new(MessageTag::USER, 0)).is_err());
}

#[test]
fn opts_default_from_empty_json() {
    let opts: LocalGroupOpts = serde_json::from_str("{}").unwrap();
    assert_eq!(opts.recv_timeout_ms, 30_000);
}
