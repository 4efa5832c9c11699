//! Loopback integration tests.
//!
//! A scripted KNXnet/IP server runs on a real tokio UDP socket bound to
//! `127.0.0.1`, and the engine talks to it through `TokioUdpTransport`.

use bytes::Bytes;
use knx_netip::addressing::IndividualAddress;
use knx_netip::connection::{Connection, ConnectionConfig, ConnectionEvent, State};
use knx_netip::discovery::describe;
use knx_netip::net::udp::TokioUdpTransport;
use knx_netip::net::IpEndpoint;
use knx_netip::protocol::constants::{KnxMedium, ServiceFamily, ServiceType};
use knx_netip::protocol::cri::Crd;
use knx_netip::protocol::description::{DescriptionRequest, DescriptionResponse};
use knx_netip::protocol::dib::{DeviceInfoDib, ServiceFamiliesDib, ServiceInfo};
use knx_netip::protocol::hpai::Hpai;
use knx_netip::protocol::services::{
    ConnectRequest, ConnectResponse, ConnectionHeader, DataAck, DataRequest, DataService, DisconnectRequest,
    DisconnectResponse,
};
use knx_netip::protocol::Frame;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

const CHANNEL: u8 = 0x07;
const ASSIGNED: u16 = 0x11FA;

/// L_Data.ind from 1.1.5 to group 1/2/3, GroupValue_Write on
const INDICATION: [u8; 11] = [0x29, 0x00, 0xBC, 0xE0, 0x11, 0x05, 0x0A, 0x03, 0x01, 0x00, 0x81];

/// L_Data.req to group 1/2/3, GroupValue_Write off
const REQUEST: [u8; 11] = [0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x80];

fn local() -> IpEndpoint {
    IpEndpoint::new(Ipv4Addr::LOCALHOST, 0)
}

fn description() -> Frame {
    DescriptionResponse::builder()
        .device_hardware(
            DeviceInfoDib::builder()
                .medium(KnxMedium::Tp1)
                .individual_address(IndividualAddress::from(0x1100))
                .device_name("Loopback Router")
                .build()
                .into_dib(),
        )
        .supported_families(
            ServiceFamiliesDib::build(&[
                ServiceInfo::new(ServiceFamily::Core, 1),
                ServiceInfo::new(ServiceFamily::IpTunneling, 1),
            ])
            .unwrap()
            .into_dib(),
        )
        .build()
        .unwrap()
}

/// Scripted server answering until a disconnect request arrives.
///
/// Returns the service types it received, in order.
async fn spawn_server() -> (IpEndpoint, JoinHandle<Vec<ServiceType>>) {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let SocketAddr::V4(addr) = socket.local_addr().unwrap() else {
        unreachable!("bound to an IPv4 address");
    };
    let endpoint = IpEndpoint::new(*addr.ip(), addr.port());

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = socket.recv_from(&mut buf).await.unwrap();
            let frame = Frame::parse(&Bytes::copy_from_slice(&buf[..len]), 0).unwrap();
            received.push(frame.service_type());

            let replies: Vec<Frame> = match frame.service_type() {
                ServiceType::ConnectRequest => {
                    assert!(ConnectRequest::parse(&frame).is_ok());
                    let crd = Crd::tunnel(IndividualAddress::from(ASSIGNED));
                    let indication = DataRequest::new(
                        DataService::Tunneling,
                        ConnectionHeader::new(CHANNEL, 0),
                        Bytes::from_static(&INDICATION),
                    );
                    vec![
                        ConnectResponse::accepted(CHANNEL, Hpai::udp(endpoint), crd).build().unwrap(),
                        indication.build().unwrap(),
                    ]
                }
                ServiceType::TunnelingRequest => {
                    let request = DataRequest::parse(&frame).unwrap();
                    assert_eq!(&request.cemi[..], &REQUEST);
                    let seq = request.connection_header.sequence_counter;
                    vec![DataAck::new(DataService::Tunneling, CHANNEL, seq, 0).build().unwrap()]
                }
                ServiceType::DescriptionRequest => {
                    assert!(DescriptionRequest::parse(&frame).is_ok());
                    vec![description()]
                }
                ServiceType::DisconnectRequest => {
                    let request = DisconnectRequest::parse(&frame).unwrap();
                    let response = DisconnectResponse::new(request.channel_id, 0).build().unwrap();
                    socket.send_to(response.bytes(), from).await.unwrap();
                    return received;
                }
                _ => Vec::new(),
            };
            for reply in replies {
                socket.send_to(reply.bytes(), from).await.unwrap();
            }
        }
    });
    (endpoint, handle)
}

#[tokio::test]
async fn test_tunnel_session_over_loopback() {
    let (server, handle) = spawn_server().await;
    let config = ConnectionConfig::default()
        .with_local_endpoint(local())
        .with_tunneling_ack_timeout(Duration::from_secs(2));
    let mut connection = Connection::new(TokioUdpTransport::new(), config);
    let mut events = connection.subscribe();

    connection.connect_tunnel(server).await.unwrap();
    assert_eq!(connection.state(), State::Connected);
    assert_eq!(connection.channel_id(), Some(CHANNEL));
    assert_eq!(connection.individual_address(), Some(IndividualAddress::from(ASSIGNED)));
    assert_eq!(connection.data_endpoint(), Some(server));

    // The server pushed an indication right after the connect response
    connection.process().await.unwrap();
    assert_eq!(connection.receive_sequence(), 1);

    connection.send(&REQUEST).await.unwrap();
    assert_eq!(connection.send_sequence(), 1);

    connection.disconnect().await.unwrap();
    assert_eq!(connection.state(), State::Disconnected);

    let received = handle.await.unwrap();
    assert_eq!(
        received,
        vec![
            ServiceType::ConnectRequest,
            ServiceType::TunnelingAck,
            ServiceType::TunnelingRequest,
            ServiceType::DisconnectRequest,
        ]
    );

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            ConnectionEvent::StateChanged(State::Connecting),
            ConnectionEvent::StateChanged(State::Connected),
            ConnectionEvent::FrameReceived(Bytes::from_static(&INDICATION)),
            ConnectionEvent::StateChanged(State::Disconnecting),
            ConnectionEvent::StateChanged(State::Disconnected),
        ]
    );
}

#[tokio::test]
async fn test_describe_over_loopback() {
    let (server, handle) = spawn_server().await;
    let mut transport = TokioUdpTransport::new();

    let info = describe(&mut transport, server, Duration::from_secs(2)).await.unwrap();
    assert_eq!(info.device_name().as_str(), "Loopback Router");
    assert_eq!(info.individual_address().to_string(), "1.1.0");
    assert_eq!(info.endpoint(), Some(server));
    assert!(info.supports(ServiceFamily::IpTunneling));

    // Let the server task finish
    let closer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let bye = DisconnectRequest::new(CHANNEL, Hpai::udp(local())).build().unwrap();
    closer.send_to(bye.bytes(), SocketAddr::from(server)).await.unwrap();
    let received = handle.await.unwrap();
    assert_eq!(received, vec![ServiceType::DescriptionRequest, ServiceType::DisconnectRequest]);
}

#[tokio::test]
async fn test_connect_times_out_without_server() {
    // Bound but silent
    let silent = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let SocketAddr::V4(addr) = silent.local_addr().unwrap() else {
        unreachable!("bound to an IPv4 address");
    };
    let config = ConnectionConfig::default()
        .with_local_endpoint(local())
        .with_connect_timeout(Duration::from_millis(200));
    let mut connection = Connection::new(TokioUdpTransport::new(), config);

    let err = connection
        .connect_tunnel(IpEndpoint::new(*addr.ip(), addr.port()))
        .await
        .unwrap_err();
    assert_eq!(err.timeout_kind(), Some(knx_netip::error::TimeoutKind::Connect));
    assert_eq!(connection.state(), State::Disconnected);
}
