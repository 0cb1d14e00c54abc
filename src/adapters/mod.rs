//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                   |
//! |----------------|--------------------|-------------------------------|
//! | `http_client`  | HttpTransport      | EspHttpConnection / TcpStream |
//! | `http_server`  | (driving)          | EspHttpServer                 |
//! | `wifi`         | StationPort        | ESP-IDF WiFi STA              |
//! | `time`         | ClockPort          | ESP timer, libc clock, SNTP   |
//! | `system`       | SystemPort         | heap stats, eFuse MAC, reboot |
//! | `nvs`          | ConfigPort         | NVS / in-memory store         |
//! | `log_sink`     | EventSink          | Serial log output             |
//! | `ota_receiver` | (event source)     | esp-ota partition writer      |
//! | `platform`     | DevicePorts        | all of the above              |

pub mod device_id;
pub mod http_client;
pub mod http_server;
pub mod log_sink;
pub mod nvs;
pub mod ota_receiver;
pub mod platform;
pub mod system;
pub mod time;
pub mod wifi;
