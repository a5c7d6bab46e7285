//! Reference packets published with the 2ping protocol document.
//!
//! Each packet is built from the opcode model, checked byte for byte
//! against the published encoding, and decoded back.

use twoping::{MessageId, Opcode, Packet};

fn id(last: u16) -> MessageId {
    let [hi, lo] = last.to_be_bytes();
    MessageId::new([0, 0, 0, 0, hi, lo])
}

fn packet(message_id: u16, opcodes: Vec<Opcode>) -> Packet {
    let mut packet = Packet::new(id(message_id));
    for opcode in opcodes {
        packet.insert(opcode).unwrap();
    }
    packet
}

fn assert_reference(packet: Packet, expected: &str) {
    let expected = hex::decode(expected).unwrap();
    assert_eq!(packet.dump().unwrap(), expected);
    assert_eq!(Packet::load(&expected).unwrap(), packet);
}

#[test]
fn reference_1a_empty() {
    assert_reference(packet(0xa001, vec![]), "32502dae00000000a0010000");
}

#[test]
fn reference_2a_reply_requested() {
    assert_reference(
        packet(0xa001, vec![Opcode::ReplyRequested]),
        "32502dad00000000a00100010000",
    );
}

#[test]
fn reference_2b_in_reply_to() {
    assert_reference(
        packet(0xb001, vec![Opcode::InReplyTo(id(0xa001))]),
        "32507da400000000b0010002000600000000a001",
    );
}

#[test]
fn reference_3b_reply_requested_in_reply_to() {
    assert_reference(
        packet(0xb001, vec![Opcode::ReplyRequested, Opcode::InReplyTo(id(0xa001))]),
        "32507da300000000b00100030000000600000000a001",
    );
}

#[test]
fn reference_3c_rtt_enclosed() {
    assert_reference(
        packet(
            0xa002,
            vec![Opcode::InReplyTo(id(0xb001)), Opcode::RttEnclosed { rtt_us: 12345 }],
        ),
        "32504d6200000000a0020006000600000000b001000400003039",
    );
}

#[test]
fn reference_4b_investigate() {
    assert_reference(
        packet(
            0xa002,
            vec![Opcode::ReplyRequested, Opcode::Investigate(vec![id(0xa001)])],
        ),
        "32508d8100000000a002002100000008000100000000a001",
    );
}

#[test]
fn reference_4c_investigation_seen() {
    assert_reference(
        packet(
            0xb002,
            vec![
                Opcode::ReplyRequested,
                Opcode::InReplyTo(id(0xa002)),
                Opcode::InvestigationSeen(vec![id(0xa001)]),
            ],
        ),
        "3250dd8e00000000b002000b0000000600000000a0020008000100000000a001",
    );
}

#[test]
fn reference_4d_rtt_enclosed() {
    assert_reference(
        packet(
            0xa003,
            vec![Opcode::InReplyTo(id(0xb002)), Opcode::RttEnclosed { rtt_us: 12345 }],
        ),
        "32504d6000000000a0030006000600000000b002000400003039",
    );
}

#[test]
fn reference_5c_investigation_unseen() {
    assert_reference(
        packet(
            0xb001,
            vec![
                Opcode::ReplyRequested,
                Opcode::InReplyTo(id(0xa002)),
                Opcode::InvestigationUnseen(vec![id(0xa001)]),
            ],
        ),
        "3250dd8700000000b00100130000000600000000a0020008000100000000a001",
    );
}

#[test]
fn reference_5d_rtt_enclosed() {
    assert_reference(
        packet(
            0xa003,
            vec![Opcode::InReplyTo(id(0xb001)), Opcode::RttEnclosed { rtt_us: 12345 }],
        ),
        "32504d6100000000a0030006000600000000b001000400003039",
    );
}

#[test]
fn reference_6b_6c_reply_requested() {
    assert_reference(
        packet(0xa002, vec![Opcode::ReplyRequested]),
        "32502dac00000000a00200010000",
    );
    assert_reference(
        packet(0xa003, vec![Opcode::ReplyRequested]),
        "32502dab00000000a00300010000",
    );
}

#[test]
fn reference_6d_reply_to_lost_packet() {
    assert_reference(
        packet(0xb002, vec![Opcode::ReplyRequested, Opcode::InReplyTo(id(0xa003))]),
        "32507da000000000b00200030000000600000000a003",
    );
}

#[test]
fn reference_6e_rtt_enclosed() {
    assert_reference(
        packet(
            0xa004,
            vec![Opcode::InReplyTo(id(0xb002)), Opcode::RttEnclosed { rtt_us: 12823 }],
        ),
        "32504b8100000000a0040006000600000000b002000400003217",
    );
}

#[test]
fn reference_6f_investigate_two() {
    assert_reference(
        packet(
            0xa00a,
            vec![
                Opcode::ReplyRequested,
                Opcode::Investigate(vec![id(0xa001), id(0xa002)]),
            ],
        ),
        "3250ed6f00000000a00a00210000000e000200000000a00100000000a002",
    );
}

#[test]
fn reference_6g_investigation_results() {
    assert_reference(
        packet(
            0xb006,
            vec![
                Opcode::ReplyRequested,
                Opcode::InReplyTo(id(0xa00a)),
                Opcode::InvestigationSeen(vec![id(0xa001)]),
                Opcode::InvestigationUnseen(vec![id(0xa002)]),
                Opcode::Investigate(vec![id(0xb002)]),
            ],
        ),
        "32508d3b00000000b006003b0000000600000000a00a0008000100000000a001\
         0008000100000000a0020008000100000000b002",
    );
}

#[test]
fn reference_6h_final_reply() {
    assert_reference(
        packet(
            0xa00b,
            vec![
                Opcode::InReplyTo(id(0xb006)),
                Opcode::RttEnclosed { rtt_us: 13112 },
                Opcode::InvestigationSeen(vec![id(0xb002)]),
            ],
        ),
        "32509a4100000000a00b000e000600000000b0060004000033380008000100000000b002",
    );
}
