//! Messages and client stubs for the `api` gRPC package
//!
//! Written in the shape `tonic-build` generates, without a build step or `protoc`.
//! The wire contract, field numbers included:
//!
//! ```proto
//! syntax = "proto3";
//! package api;
//!
//! message AudioBuf      { int32 sensor_id = 1; uint32 seq_offset = 2; bytes pcm = 3; }
//! message Empty         {}
//! message StatusRequest { int32 sensor_id = 1; string status = 2; }
//! message StatusResponse{ bool success = 1; }
//! message Payload       { string sensor_id = 1; }
//!
//! service AnalyzerService { rpc Analyze(stream AudioBuf) returns (Empty); }
//! service GatewayService  { rpc UpdateStatus(StatusRequest) returns (StatusResponse); }
//! service HealthService   { rpc Healthcheck(Payload) returns (Empty); }
//! ```

/// One batch of PCM for the analyzer
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioBuf {
    #[prost(int32, tag = "1")]
    pub sensor_id: i32,
    #[prost(uint32, tag = "2")]
    pub seq_offset: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub pcm: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusRequest {
    #[prost(int32, tag = "1")]
    pub sensor_id: i32,
    #[prost(string, tag = "2")]
    pub status: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct StatusResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

/// Liveness probe argument
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    #[prost(string, tag = "1")]
    pub sensor_id: ::prost::alloc::string::String,
}

/// Client for `api.AnalyzerService`
pub mod analyzer_service_client {
    use tonic::codegen::http;
    use tonic::GrpcMethod;
    use tonic::transport::Channel;

    #[derive(Debug, Clone)]
    pub struct AnalyzerServiceClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl AnalyzerServiceClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        /// Client-streaming upload of audio batches
        pub async fn analyze(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::AudioBuf>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/api.AnalyzerService/Analyze");
            let mut req = request.into_streaming_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("api.AnalyzerService", "Analyze"));
            self.inner.client_streaming(req, path, codec).await
        }
    }
}

/// Client for `api.GatewayService`
pub mod gateway_service_client {
    use tonic::codegen::http;
    use tonic::GrpcMethod;
    use tonic::transport::Channel;

    #[derive(Debug, Clone)]
    pub struct GatewayServiceClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl GatewayServiceClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        pub async fn update_status(
            &mut self,
            request: impl tonic::IntoRequest<super::StatusRequest>,
        ) -> std::result::Result<tonic::Response<super::StatusResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/api.GatewayService/UpdateStatus");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("api.GatewayService", "UpdateStatus"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Client for `api.HealthService`
pub mod health_service_client {
    use tonic::codegen::http;
    use tonic::GrpcMethod;
    use tonic::transport::Channel;

    #[derive(Debug, Clone)]
    pub struct HealthServiceClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl HealthServiceClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        pub async fn healthcheck(
            &mut self,
            request: impl tonic::IntoRequest<super::Payload>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/api.HealthService/Healthcheck");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("api.HealthService", "Healthcheck"));
            self.inner.unary(req, path, codec).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_audio_buf_wire_layout() {
        let msg = AudioBuf {
            sensor_id: 7,
            seq_offset: 300,
            pcm: vec![1, 2],
        };
        let bytes = msg.encode_to_vec();
        // field 1 varint, field 2 varint (300 = 0xAC 0x02), field 3 length-delimited
        assert_eq!(bytes, vec![0x08, 7, 0x10, 0xAC, 0x02, 0x1A, 2, 1, 2]);
        assert_eq!(AudioBuf::decode(bytes.as_slice()).unwrap(), msg);
    }

    #[test]
    fn test_status_request_encodes_text_status() {
        let msg = StatusRequest {
            sensor_id: 3,
            status: "online".to_string(),
        };
        let bytes = msg.encode_to_vec();
        assert_eq!(&bytes[..4], &[0x08, 3, 0x12, 6]);
        assert_eq!(&bytes[4..], b"online");
    }

    #[test]
    fn test_default_status_response_is_failure() {
        let decoded = StatusResponse::decode(&[][..]).unwrap();
        assert!(!decoded.success);
    }
}
