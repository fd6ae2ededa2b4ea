//! 서비스 준비 상태 프로버
//!
//! 서비스는 공유 전역 예산 안에서 하나씩 순서대로 폴링됩니다. 서비스마다
//! 별도의 하위 예산이 있으며, 둘 중 먼저 소진되는 쪽이 해당 서비스의
//! 폴링을 끝냅니다.
//!
//! ```text
//! global budget  |==========================================|
//! synapse        |==ready|
//! element                |-----x-----x-----x--(sub-budget)--|
//! admin                                                     |x (global exhausted)
//! ```
//!
//! HTTP 200과 404는 모두 준비됨으로 봅니다. 프로버는 실패하지 않으며
//! 서비스마다 정확히 하나의 [`ServiceHealth`] 레코드를 만듭니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use stackprobe_core::config::{ReadinessConfig, ServiceEndpoint};
use stackprobe_core::error::ReadinessError;
use stackprobe_core::types::ServiceHealth;

use crate::client::HttpClient;

/// "서비스 동작 중"으로 취급하는 상태 코드이면 `true`
///
/// 일부 헬스 엔드포인트는 의도적으로 없으므로 404도 허용합니다.
pub fn is_ready_status(status: u16) -> bool {
    status == 200 || status == 404
}

/// 폴링 예산
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// 모든 서비스가 공유하는 예산
    pub global_timeout: Duration,
    /// 서비스별 예산
    pub per_service_timeout: Duration,
    /// 시도 사이 대기 시간
    pub poll_interval: Duration,
    /// 요청 하나의 타임아웃
    pub request_timeout: Duration,
    /// 서비스당 요청 한 번, 재시도 없음
    pub single_attempt: bool,
}

impl ProbePolicy {
    /// 설정에서 폴링 정책을 만듭니다.
    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self {
            global_timeout: config.global_timeout(),
            per_service_timeout: config.per_service_timeout(),
            poll_interval: config.poll_interval(),
            request_timeout: config.request_timeout(),
            single_attempt: false,
        }
    }

    /// 서비스당 요청 한 번. 사전 점검(pre-flight)에 사용합니다.
    pub fn single_attempt(request_timeout: Duration) -> Self {
        Self {
            global_timeout: request_timeout,
            per_service_timeout: request_timeout,
            poll_interval: Duration::ZERO,
            request_timeout,
            single_attempt: true,
        }
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self::from_config(&ReadinessConfig::default())
    }
}

/// 준비되거나 예산이 소진될 때까지 헬스 엔드포인트를 폴링합니다.
pub struct ReadinessProber<H: HttpClient> {
    client: Arc<H>,
    policy: ProbePolicy,
}

impl<H: HttpClient> ReadinessProber<H> {
    pub fn new(client: Arc<H>, policy: ProbePolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }

    /// 모든 엔드포인트를 순서대로 점검하고 엔드포인트마다 레코드 하나를 반환합니다.
    pub async fn probe_all(&self, endpoints: &[ServiceEndpoint]) -> Vec<ServiceHealth> {
        let global_deadline = Instant::now() + self.policy.global_timeout;
        let mut records = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let record = self.probe_service(endpoint, global_deadline).await;
            if record.ready {
                info!(
                    service = %record.name,
                    url = %record.url,
                    elapsed_secs = record.elapsed_secs,
                    attempts = record.attempts,
                    "service ready"
                );
            } else {
                warn!(
                    service = %record.name,
                    url = %record.url,
                    attempts = record.attempts,
                    last_error = record.last_error.as_deref().unwrap_or(""),
                    "service not ready"
                );
            }
            records.push(record);
        }
        records
    }

    async fn probe_service(
        &self,
        endpoint: &ServiceEndpoint,
        global_deadline: Instant,
    ) -> ServiceHealth {
        let started = Instant::now();
        let deadline = (started + self.policy.per_service_timeout).min(global_deadline);

        let mut attempts = 0u32;
        let mut ready = false;
        let mut last_status = None;
        let mut last_error = None;

        loop {
            attempts += 1;
            match self
                .client
                .get(&endpoint.url, self.policy.request_timeout)
                .await
            {
                Ok(response) => {
                    last_status = Some(response.status);
                    if is_ready_status(response.status) {
                        ready = true;
                        last_error = None;
                    } else {
                        last_error = Some(format!("unexpected status {}", response.status));
                    }
                }
                Err(e) => last_error = Some(e.to_string()),
            }
            debug!(
                service = %endpoint.name,
                attempt = attempts,
                ready,
                status = ?last_status,
                "health probe attempt"
            );

            if ready || self.policy.single_attempt {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.policy.poll_interval.min(deadline - now)).await;
            if Instant::now() >= deadline {
                break;
            }
        }

        ServiceHealth {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            ready,
            elapsed_secs: started.elapsed().as_secs_f64(),
            attempts,
            last_status,
            last_error,
        }
    }
}

/// 준비되지 않은 서비스 이름
pub fn unready_services(records: &[ServiceHealth]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.ready)
        .map(|r| r.name.clone())
        .collect()
}

/// 권고성 검사. 준비되지 않은 서비스를 모두 담은 `Err(ServiceUnready)`
pub fn ensure_all_ready(records: &[ServiceHealth]) -> Result<(), ReadinessError> {
    let services = unready_services(records);
    if services.is_empty() {
        Ok(())
    } else {
        Err(ReadinessError::ServiceUnready { services })
    }
}
