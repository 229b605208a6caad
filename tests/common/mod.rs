//! Loopback WireGuard responder used by the integration tests
//!
//! Plays the responder role of the handshake on a local UDP socket, opens the
//! one transport message it receives and answers it according to `Reply`.

#![allow(dead_code)]

use std::net::Ipv4Addr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use wireguard_oneshot::crypto::noise::{HandshakeState, TransportKeys};
use wireguard_oneshot::crypto::{PrivateKey, PublicKey};
use wireguard_oneshot::protocol::cookie::CookieGenerator;
use wireguard_oneshot::protocol::messages::{MessageInitiation, MessageResponse, TransportHeader};
use wireguard_oneshot::protocol::transport;
use wireguard_oneshot::protocol::KeyPair;
use wireguard_oneshot::Configuration;

/// Index the stub hands out in its response
pub const RESPONDER_INDEX: u32 = 0x5eed_0001;

/// Clamped all-0x01 key material used as the client's static key
pub const CLIENT_PRIVATE_KEY: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// What the stub does after the handshake
#[derive(Debug, Clone)]
pub enum Reply {
    /// Seal these bytes back to the client
    Payload(Vec<u8>),
    /// Seal these bytes, then flip one ciphertext bit
    Tampered(Vec<u8>),
    /// Answer the handshake, then stay silent
    Silent,
    /// Answer the initiation with a cookie reply instead of a response
    CookieReply,
}

/// What the stub observed
#[derive(Debug, Default)]
pub struct Observed {
    /// Static key the initiator proved
    pub initiator_static: Option<[u8; 32]>,
    /// Full decrypted transport plaintext, padding included
    pub plaintext: Vec<u8>,
}

pub struct StubResponder {
    socket: UdpSocket,
    private: PrivateKey,
    psk: [u8; 32],
}

impl StubResponder {
    pub async fn bind(psk: [u8; 32]) -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            private: PrivateKey::generate().unwrap(),
            psk,
        }
    }

    pub fn endpoint(&self) -> String {
        self.socket.local_addr().unwrap().to_string()
    }

    pub fn public_key(&self) -> PublicKey {
        self.private.public_key()
    }

    /// Client configuration pointing at this stub
    pub fn client_config(&self) -> Configuration {
        Configuration {
            private_key: CLIENT_PRIVATE_KEY.to_string(),
            public_key: BASE64.encode(self.public_key().as_bytes()),
            preshared_key: None,
            endpoint: self.endpoint(),
            client_ip_address: CLIENT_IP.to_string(),
        }
    }

    pub fn spawn(self, reply: Reply) -> JoinHandle<Observed> {
        tokio::spawn(async move { self.serve(reply).await })
    }

    async fn serve(self, reply: Reply) -> Observed {
        let mut observed = Observed::default();
        let mut buf = vec![0u8; 65535];

        let (len, peer) = self.socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, MessageInitiation::SIZE);

        if let Reply::CookieReply = reply {
            let mut cookie = [0u8; 64];
            cookie[0] = 3;
            self.socket.send_to(&cookie, peer).await.unwrap();
            return observed;
        }

        let (response, keys, initiator_index, initiator_static) = self.respond(&buf[..len]);
        observed.initiator_static = Some(initiator_static);
        self.socket.send_to(&response, peer).await.unwrap();

        let key_pair = KeyPair::new(&keys, RESPONDER_INDEX, initiator_index);

        let (len, peer) = self.socket.recv_from(&mut buf).await.unwrap();
        let message = &buf[..len];
        let header = TransportHeader::from_bytes(message).unwrap();
        assert_eq!(header.receiver, RESPONDER_INDEX);
        assert_eq!(header.counter, 0);
        observed.plaintext = key_pair
            .receive
            .open(header.counter, TransportHeader::payload(message))
            .unwrap();

        let (payload, tamper) = match reply {
            Reply::Payload(payload) => (payload, false),
            Reply::Tampered(payload) => (payload, true),
            Reply::Silent | Reply::CookieReply => return observed,
        };

        let source = Ipv4Addr::new(
            observed.plaintext[16],
            observed.plaintext[17],
            observed.plaintext[18],
            observed.plaintext[19],
        );
        let mut sealed =
            transport::seal_packet(&key_pair, &payload, source, CLIENT_IP, 49152).unwrap();
        if tamper {
            let last = sealed.len() - 1;
            sealed[last] ^= 0x01;
        }
        self.socket.send_to(&sealed, peer).await.unwrap();

        observed
    }

    /// Responder half of Noise IKpsk2
    pub fn respond(&self, init: &[u8]) -> ([u8; MessageResponse::SIZE], TransportKeys, u32, [u8; 32]) {
        let msg = MessageInitiation::from_bytes(init).unwrap();
        let mut state = HandshakeState::new(self.public_key().as_bytes());

        let initiator_ephemeral = PublicKey::from_bytes(msg.ephemeral);
        state.mix_chain(&msg.ephemeral);
        state.mix_hash(&msg.ephemeral);

        let es = self.private.shared_secret(&initiator_ephemeral);
        let key = state.mix_key(es.as_bytes());
        let static_bytes: [u8; 32] = state
            .decrypt_and_hash(&key, &msg.encrypted_static)
            .unwrap()
            .try_into()
            .unwrap();
        let initiator_static = PublicKey::from_bytes(static_bytes);

        let ss = self.private.shared_secret(&initiator_static);
        let key = state.mix_key(ss.as_bytes());
        state
            .decrypt_and_hash(&key, &msg.encrypted_timestamp)
            .unwrap();

        let ephemeral = PrivateKey::generate().unwrap();
        let ephemeral_public = ephemeral.public_key();
        state.mix_hash(ephemeral_public.as_bytes());
        state.mix_chain(ephemeral_public.as_bytes());
        state.mix_chain(ephemeral.shared_secret(&initiator_ephemeral).as_bytes());
        state.mix_chain(ephemeral.shared_secret(&initiator_static).as_bytes());
        let key = state.mix_key_and_hash(&self.psk);
        let empty = state.encrypt_and_hash(&key, &[]).unwrap();

        let mut response = MessageResponse {
            sender: RESPONDER_INDEX,
            receiver: msg.sender,
            ephemeral: ephemeral_public.to_bytes(),
            encrypted_empty: empty.try_into().unwrap(),
            mac1: [0u8; 16],
            mac2: [0u8; 16],
        }
        .to_bytes();
        CookieGenerator::new(&initiator_static)
            .add_macs(&mut response)
            .unwrap();

        (
            response,
            TransportKeys::derive_responder(&state.chaining_key),
            msg.sender,
            static_bytes,
        )
    }
}
