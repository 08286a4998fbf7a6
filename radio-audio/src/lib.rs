#![doc = r#"
radio-audio - fan-out et diffusion du flux audio encodé

Cette crate fournit les deux derniers maillons du pipeline de lecture : le
[`Broadcaster`] qui distribue chaque chunk MP3 produit par `ffmpeg` à un
nombre variable d'abonnés sans jamais bloquer sur le plus lent, et
l'[`icecast_sink::IcecastSink`] qui pousse ce même flux vers un serveur
Icecast avec reconnexion automatique en tâche de fond.

# Architecture

```text
PlaybackEngine (ffmpeg stdout) → Broadcaster ─┬─→ IcecastSink (abonné longue durée)
                                               └─→ abonnés HTTP/SSE (radio-events)
```

`IcecastSink` s'abonne au `Broadcaster` exactement comme un auditeur HTTP : il
ne fait pas partie de l'arbre `pipeline` d'une piste et n'est donc jamais
recréé ni annulé par une transition de piste.

Le [`pipeline`] module fournit l'arbre de nœuds générique (`AudioPipelineNode`,
`NodeLogic`, `Node<L>`) utilisé pour orchestrer le démarrage, l'arrêt et le
cleanup coordonné des sinks.
"#]

mod broadcaster;
mod error;
pub mod icecast_sink;
pub mod pipeline;

pub use broadcaster::{Broadcaster, Received, Subscriber};
pub use error::{AudioError, Result};
pub use icecast_sink::{IcecastSink, IcecastSinkConfig};
