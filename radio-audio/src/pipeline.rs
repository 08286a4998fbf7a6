//! Architecture de pipeline avec propagation automatique du run et gestion d'arrêt
//!
//! Ce module définit le trait `AudioPipelineNode` qui permet de construire des arbres
//! de traitement du flux audio encodé avec :
//! - Démarrage automatique de tous les enfants lors du run de la tête
//! - Arrêt coordonné sur EOF ou erreur
//! - Propagation bidirectionnelle sans boucle infinie
//!
//! # Architecture
//!
//! Les pipelines forment des **arbres** (pas de DAG) où :
//! - Les sources n'ont pas d'input (get_tx retourne None)
//! - Les sinks n'ont pas d'enfants (register panic)
//!
//! Contrairement à un pipeline PCM, les nœuds de ce crate se passent des
//! morceaux de flux déjà encodés (`Bytes`, typiquement des octets MP3 issus
//! de `ffmpeg`) plutôt que des échantillons. Le partage via `Bytes` évite les
//! copies : cloner une `Bytes` ne clone que le pointeur et le compteur de
//! référence.
//!
//! # Mécanisme d'arrêt
//!
//! - **Descendant** : `stop_token.cancel()` propage l'arrêt vers les fils
//! - **Montant** : Le retour de `run()` informe le parent
//! - **Détection** : Un enfant mort → parent voit `send().is_err()` ou `await handle`

use crate::AudioError;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Trait pour les nœuds d'un pipeline de diffusion
#[async_trait::async_trait]
pub trait AudioPipelineNode: Send + 'static {
    /// Retourne un clone du sender pour recevoir des chunks, ou `None` pour
    /// les nœuds qui n'ont pas d'input (sources).
    fn get_tx(&self) -> Option<mpsc::Sender<Bytes>>;

    /// Enregistre un nœud enfant dans l'arbre.
    ///
    /// Panique si ce nœud est un sink (nœud terminal sans enfants).
    fn register(&mut self, child: Box<dyn AudioPipelineNode>);

    /// Lance le nœud et tous ses enfants.
    async fn run(self: Box<Self>, stop_token: CancellationToken) -> Result<(), AudioError>;

    /// Lance le pipeline en arrière-plan et retourne un handle de contrôle.
    fn start(self: Box<Self>) -> PipelineHandle {
        let stop_token = CancellationToken::new();
        let token_for_task = stop_token.clone();

        let join_handle = tokio::spawn(async move { self.run(token_for_task).await });

        PipelineHandle {
            stop_token,
            join_handle,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Séparation plomberie/logique métier
// ═══════════════════════════════════════════════════════════════════════════════

/// Raison de l'arrêt d'un nœud, passée à `cleanup()`.
#[derive(Debug, Clone)]
pub enum StopReason {
    /// Fin normale - toutes les données ont été traitées (EOF)
    Completed,
    /// Cancel explicite demandé via CancellationToken
    Cancelled,
    /// Un nœud enfant s'est terminé prématurément
    ChildFinished,
    /// Une erreur s'est produite (dans ce nœud ou un enfant)
    Error(AudioError),
}

/// Logique métier pure d'un nœud, séparée de l'orchestration (spawning,
/// monitoring, cleanup) que fournit [`Node`].
#[async_trait::async_trait]
pub trait NodeLogic: Send + 'static {
    /// Traite le flux entrant et produit un flux vers les enfants.
    ///
    /// `input` est `None` pour les sources. L'implémentation doit surveiller
    /// `stop_token.cancelled()` dans sa boucle principale et sortir
    /// proprement sur EOF (`input.recv() == None`).
    async fn process(
        &mut self,
        input: Option<mpsc::Receiver<Bytes>>,
        output: Vec<mpsc::Sender<Bytes>>,
        stop_token: CancellationToken,
    ) -> Result<(), AudioError>;

    /// Cleanup appelé automatiquement après l'arrêt du nœud. Ne fait rien
    /// par défaut ; les sinks le redéfinissent pour fermer proprement leurs
    /// ressources externes selon la raison de l'arrêt.
    async fn cleanup(&mut self, _reason: StopReason) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Handle pour contrôler un pipeline en cours d'exécution.
pub struct PipelineHandle {
    stop_token: CancellationToken,
    join_handle: JoinHandle<Result<(), AudioError>>,
}

impl PipelineHandle {
    /// Demande l'arrêt du pipeline. Non-bloquant.
    pub fn stop(&self, reason: Option<AudioError>) {
        if let Some(err) = reason {
            tracing::info!(%err, "pipeline stop requested with error");
        } else {
            tracing::info!("pipeline stop requested");
        }
        self.stop_token.cancel();
    }

    /// Attend la complétion du pipeline.
    pub async fn wait(self) -> Result<(), AudioError> {
        match self.join_handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                Err(AudioError::Processing(format!("pipeline task panicked: {e}")))
            }
            Err(e) => Err(AudioError::Processing(format!(
                "pipeline task cancelled: {e}"
            ))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Équivalent à `stop()` suivi de `wait()`.
    pub async fn stop_and_wait(self, reason: Option<AudioError>) -> Result<(), AudioError> {
        self.stop(reason);
        self.wait().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }
}

/// Wrapper générique qui implémente l'orchestration d'un nœud : spawn des
/// enfants, monitoring pour détection d'arrêt prématuré, cleanup coordonné.
pub struct Node<L: NodeLogic> {
    logic: L,
    rx: Option<mpsc::Receiver<Bytes>>,
    tx: Option<mpsc::Sender<Bytes>>,
    children: Vec<Box<dyn AudioPipelineNode>>,
    child_txs: Vec<mpsc::Sender<Bytes>>,
}

impl<L: NodeLogic> Node<L> {
    /// Crée un nouveau nœud source (sans input).
    pub fn new_source(logic: L) -> Self {
        Self {
            logic,
            rx: None,
            tx: None,
            children: Vec::new(),
            child_txs: Vec::new(),
        }
    }

    /// Crée un nouveau nœud avec input (converter ou sink).
    pub fn new_with_input(logic: L, buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        Self {
            logic,
            rx: Some(rx),
            tx: Some(tx),
            children: Vec::new(),
            child_txs: Vec::new(),
        }
    }

    pub fn logic(&self) -> &L {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }
}

#[async_trait::async_trait]
impl<L: NodeLogic> AudioPipelineNode for Node<L> {
    fn get_tx(&self) -> Option<mpsc::Sender<Bytes>> {
        self.tx.clone()
    }

    fn register(&mut self, child: Box<dyn AudioPipelineNode>) {
        if let Some(tx) = child.get_tx() {
            self.child_txs.push(tx);
        }
        self.children.push(child);
    }

    async fn run(mut self: Box<Self>, stop_token: CancellationToken) -> Result<(), AudioError> {
        let Node {
            mut logic,
            rx,
            children,
            child_txs,
            ..
        } = *self;

        tracing::debug!(children = children.len(), "node run starting");

        let mut child_handles = Vec::new();
        for child in children.into_iter() {
            let child_token = stop_token.child_token();
            child_handles.push(tokio::spawn(async move { child.run(child_token).await }));
        }

        let mut child_monitor = if child_handles.is_empty() {
            None
        } else {
            let handles = child_handles;
            Some(tokio::spawn(async move {
                let mut first_error = None;
                for handle in handles {
                    match handle.await {
                        Ok(Ok(())) => continue,
                        Ok(Err(e)) => {
                            tracing::warn!(err = %e, "child node error");
                            first_error.get_or_insert(e);
                        }
                        Err(e) => {
                            tracing::error!(err = %e, "child node panicked");
                            first_error
                                .get_or_insert(AudioError::Processing(format!("child panicked: {e}")));
                        }
                    }
                }
                match first_error {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }))
        };

        let (stop_reason, process_result, child_monitor_consumed) =
            if let Some(monitor) = &mut child_monitor {
                tokio::select! {
                    _ = stop_token.cancelled() => (StopReason::Cancelled, Ok(()), false),

                    child_result = monitor => match child_result {
                        Ok(Ok(())) => (StopReason::Completed, Ok(()), true),
                        Ok(Err(e)) => (StopReason::Error(e.clone()), Err(e), true),
                        Err(e) => {
                            let error = AudioError::Processing(format!("child monitor panicked: {e}"));
                            (StopReason::Error(error.clone()), Err(error), true)
                        }
                    },

                    process_result = logic.process(rx, child_txs.clone(), stop_token.clone()) => {
                        match process_result {
                            Ok(()) => (StopReason::Completed, Ok(()), false),
                            Err(e) => (StopReason::Error(e.clone()), Err(e), false),
                        }
                    }
                }
            } else {
                tokio::select! {
                    _ = stop_token.cancelled() => (StopReason::Cancelled, Ok(()), true),

                    process_result = logic.process(rx, child_txs.clone(), stop_token.clone()) => {
                        match process_result {
                            Ok(()) => (StopReason::Completed, Ok(()), true),
                            Err(e) => (StopReason::Error(e.clone()), Err(e), true),
                        }
                    }
                }
            };

        drop(child_txs);

        match &stop_reason {
            StopReason::Completed => {}
            StopReason::Cancelled | StopReason::ChildFinished | StopReason::Error(_) => {
                stop_token.cancel();
            }
        }

        if !child_monitor_consumed {
            if let Some(monitor) = child_monitor {
                match monitor.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        if process_result.is_ok() {
                            return Err(e);
                        }
                    }
                    Err(e) => tracing::error!(err = %e, "child monitor panicked during cleanup"),
                }
            }
        }

        if let Err(cleanup_err) = logic.cleanup(stop_reason).await {
            tracing::error!(err = %cleanup_err, "node cleanup failed");
            if process_result.is_ok() {
                return Err(cleanup_err);
            }
        }

        process_result
    }
}
