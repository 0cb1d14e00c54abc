//! Local handlers for the inbound HTTP surface.
//!
//! The server adapter turns each request into an [`ApiRequest`] and hands
//! it here; routing and the forwarding decision live in
//! [`protocol::api`](crate::protocol::api).

use log::{info, warn};

use crate::protocol::api::{self, ApiRequest, ApiResponse, Dispatch, Route};
use crate::protocol::envelope::{self, OtaRequest, RenameRequest, SmsRequest};
use crate::transport::Method;

use super::hooks::AgentHooks;
use super::ports::{ConfigPort, DevicePorts, EventSink};
use super::service::AgentService;

const OTA_READY: &str = "Ready for OTA";

impl<H: AgentHooks> AgentService<H> {
    /// Answer one inbound request.
    pub fn handle_request(
        &mut self,
        request: &ApiRequest<'_>,
        dev: &mut impl DevicePorts,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> ApiResponse {
        match api::dispatch(request) {
            Dispatch::Reject(response) => response,
            Dispatch::Relay { target } => api::relay(dev, target, request, self.budget()),
            Dispatch::Local(route) => self.handle_local(route, request, dev, store, sink),
        }
    }

    fn handle_local(
        &mut self,
        route: Route,
        request: &ApiRequest<'_>,
        dev: &mut impl DevicePorts,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> ApiResponse {
        match route {
            Route::Ping => self.snapshot_response(&*dev),
            Route::Data => self.handle_data(request, &*dev),
            Route::Rename => self.handle_rename(request.body, store),
            Route::Restart => {
                self.schedule_restart(dev.now_ms());
                ApiResponse::text(200, "restarting")
            }
            Route::Ota => self.handle_ota(request.body, dev, sink),
            Route::Sms => self.handle_sms(request.body, &*dev),
            Route::ModuleReset => match store.reset() {
                Ok(()) => {
                    info!("API: stored configuration erased");
                    ApiResponse::empty(200)
                }
                Err(e) => {
                    warn!("API: reset failed: {}", e);
                    ApiResponse::error(500, "reset failed")
                }
            },
        }
    }

    fn snapshot_response(&self, dev: &impl DevicePorts) -> ApiResponse {
        ApiResponse::json(200, self.snapshot(dev).to_json())
    }

    fn handle_data(&mut self, request: &ApiRequest<'_>, dev: &impl DevicePorts) -> ApiResponse {
        if request.method == Method::Get {
            return self.snapshot_response(dev);
        }
        let reply = self.hooks.use_data(request.body);
        self.refresh_needed = true;
        match reply.body {
            Some(body) => ApiResponse::json(reply.status, body),
            None => ApiResponse::json(reply.status, self.snapshot(dev).to_json()),
        }
    }

    fn handle_rename(&mut self, body: &str, store: &impl ConfigPort) -> ApiResponse {
        let Ok(rename) = envelope::parse::<RenameRequest>(body) else {
            return ApiResponse::parse_error();
        };
        let mut updated = self.device.clone();
        if let Err(msg) = updated.set_name(rename.name.trim()) {
            return ApiResponse::error(500, msg);
        }
        if let Err(e) = store.save(&updated) {
            warn!("API: rename not persisted: {}", e);
            return ApiResponse::error(500, "save failed");
        }
        info!("API: renamed '{}' -> '{}'", self.device.name, updated.name);
        self.device = updated;
        self.refresh_needed = true;
        ApiResponse::empty(200)
    }

    fn handle_ota(&mut self, body: &str, dev: &mut impl DevicePorts, sink: &mut impl EventSink) -> ApiResponse {
        if self.device.autonomous {
            let code = self.start_ota(None, dev, sink);
            return ApiResponse::text(code, OTA_READY);
        }

        let request = if body.trim().is_empty() {
            OtaRequest::default()
        } else {
            match envelope::parse::<OtaRequest>(body) {
                Ok(r) => r,
                Err(_) => return ApiResponse::parse_error(),
            }
        };
        let network = request
            .ssid
            .as_deref()
            .map(|ssid| (ssid, request.pwd.as_deref().unwrap_or("")));
        let code = self.start_ota(network, dev, sink);
        ApiResponse::empty(code)
    }

    fn handle_sms(&mut self, body: &str, dev: &impl DevicePorts) -> ApiResponse {
        let Ok(sms) = envelope::parse::<SmsRequest>(body) else {
            return ApiResponse::parse_error();
        };
        if self.hooks.process_sms(&sms.phone_number, sms.is_admin, &sms.message) {
            self.snapshot_response(dev)
        } else {
            ApiResponse::text(500, "")
        }
    }
}
