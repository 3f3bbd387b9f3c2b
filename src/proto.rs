//! Protobuf messages and gRPC stubs generated from `proto/echo.proto`.

#![allow(clippy::all)]

tonic::include_proto!("microsoft.telepathy.proto_buf");
